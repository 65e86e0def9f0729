//! Volume-averaged price levels (Volavs).
//!
//! A Volav is a cluster of trading activity represented by the volume-weighted average price of
//! the prints it covers. The builder buckets weighted prints by price, grows levels from the
//! heaviest buckets, merges levels closer than the merge threshold, and finally enforces the
//! minimum gap between every pair of retained levels:
//!
//! ```text
//! prints -> buckets (round(price / bucket_size)) -> ranked buckets
//!        -> range VWAP per bucket -> merge / cascade -> min-gap post-pass -> top-N levels
//! ```
//!
//! Levels live in an index-addressed `Vec`. Every merge removes exactly one level, so both merge
//! loops terminate within as many iterations as there are levels.

use crate::{config::TruthTicksConfig, print::WeightedPrint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Tolerance for price comparisons.
const PRICE_EPSILON: f64 = 1e-9;

/// Inclusive price range covered by a [`Volav`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

/// Volume-averaged price level.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Volav {
    /// Volume-weighted average price of the prints within the level's range.
    pub price: f64,
    pub weighted_volume: f64,
    pub tick_count: usize,
    /// Share of the total truth volume of the input, within `[0, 1]`.
    pub volume_share: f64,
    /// Lowest and highest print price in the level.
    pub price_range: PriceRange,
    pub last_print_timestamp: i64,
    /// Whether this level absorbed at least one other level.
    pub merged: bool,
}

/// Sizing parameters of a Volav computation, resolved from average daily volume.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct VolavParams {
    pub bucket_size: f64,
    pub min_gap: f64,
    pub merge_threshold: f64,
    pub top_n: usize,
}

impl VolavParams {
    pub fn for_adv(config: &TruthTicksConfig, average_daily_volume: f64) -> Self {
        let min_gap = config.min_gap(average_daily_volume);
        Self {
            bucket_size: config.bucket_size(average_daily_volume),
            min_gap,
            merge_threshold: min_gap * config.merge_threshold_ratio,
            top_n: config.top_n,
        }
    }

    pub fn with_top_n(self, top_n: usize) -> Self {
        Self {
            top_n: top_n.max(1),
            ..self
        }
    }
}

/// Accumulated statistics of the prints inside a price range.
#[derive(Debug, Clone, Copy)]
struct RangeStats {
    volume: f64,
    price_volume: f64,
    ticks: usize,
    min_price: f64,
    max_price: f64,
    last_timestamp: i64,
}

impl RangeStats {
    fn vwap(&self) -> f64 {
        self.price_volume / self.volume
    }
}

/// Candidate level while clustering: the inclusive span of bucket keys it covers plus its
/// statistics.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    low_key: i64,
    high_key: i64,
    stats: RangeStats,
    merged: bool,
}

impl Candidate {
    fn price(&self) -> f64 {
        self.stats.vwap()
    }

    fn overlaps(&self, other: &Candidate) -> bool {
        self.low_key <= other.high_key && other.low_key <= self.high_key
    }
}

/// Bucket a price falls into. Bucketing and range membership both go through this, so a
/// price on a half-bucket boundary always lands in exactly one bucket.
fn bucket_key(price: f64, bucket_size: f64) -> i64 {
    (price / bucket_size).round() as i64
}

#[derive(Debug, Clone, Copy, Default)]
struct BucketAcc {
    volume: f64,
    price_volume: f64,
}

/// Builds the top-N Volav levels for a set of weighted prints.
#[derive(Debug, Clone, Copy)]
pub struct VolavBuilder {
    params: VolavParams,
}

impl VolavBuilder {
    pub fn new(params: VolavParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &VolavParams {
        &self.params
    }

    /// Compute levels ranked by weighted volume descending.
    ///
    /// Returns an empty set when no print carries weight. Output is deterministic for a given
    /// input sequence and parameters.
    pub fn build(&self, prints: &[WeightedPrint<'_>]) -> Vec<Volav> {
        let truth: Vec<WeightedPrint<'_>> = prints
            .iter()
            .copied()
            .filter(WeightedPrint::is_truth)
            .collect();
        if truth.is_empty() {
            return Vec::new();
        }

        let total_volume: f64 = truth.iter().map(WeightedPrint::weighted_volume).sum();
        let bucket_size = self.params.bucket_size;
        let keyed: Vec<(i64, WeightedPrint<'_>)> = truth
            .iter()
            .map(|print| (bucket_key(print.price(), bucket_size), *print))
            .collect();

        let mut buckets: BTreeMap<i64, BucketAcc> = BTreeMap::new();
        for (key, print) in &keyed {
            let bucket = buckets.entry(*key).or_default();
            bucket.volume += print.weighted_volume();
            bucket.price_volume += print.weighted_volume() * print.price();
        }

        let mut ranked: Vec<(i64, BucketAcc)> = buckets.into_iter().collect();
        ranked.sort_by(|(key_a, a), (key_b, b)| {
            b.volume
                .total_cmp(&a.volume)
                .then_with(|| key_a.cmp(key_b))
        });

        let mut levels: Vec<Candidate> = Vec::with_capacity(self.params.top_n);
        let mut merges = 0usize;

        for (key, _) in ranked {
            if levels.len() >= self.params.top_n {
                break;
            }

            let Some(stats) = range_stats(&keyed, key, key) else {
                continue;
            };
            let candidate = Candidate {
                low_key: key,
                high_key: key,
                stats,
                merged: false,
            };

            match self.find_merge_target(&levels, &candidate, None) {
                Some(index) => {
                    levels[index] = merge(&keyed, &levels[index], &candidate);
                    merges += 1 + self.cascade(&keyed, &mut levels, index);
                }
                None => levels.push(candidate),
            }
        }

        merges += enforce_min_gap(&keyed, &mut levels, self.params.min_gap);

        levels.sort_by(|a, b| {
            b.stats
                .volume
                .total_cmp(&a.stats.volume)
                .then_with(|| a.price().total_cmp(&b.price()))
        });
        levels.truncate(self.params.top_n);

        debug!(
            prints = truth.len(),
            levels = levels.len(),
            merges,
            bucket_size,
            min_gap = self.params.min_gap,
            "built volav levels"
        );

        levels
            .into_iter()
            .map(|level| Volav {
                price: level.price(),
                weighted_volume: level.stats.volume,
                tick_count: level.stats.ticks,
                volume_share: (level.stats.volume / total_volume).clamp(0.0, 1.0),
                price_range: PriceRange {
                    min: level.stats.min_price,
                    max: level.stats.max_price,
                },
                last_print_timestamp: level.stats.last_timestamp,
                merged: level.merged,
            })
            .collect()
    }

    /// Compute the single most dominant level, if any print carries weight.
    pub fn dominant(&self, prints: &[WeightedPrint<'_>]) -> Option<Volav> {
        Self::new(self.params.with_top_n(1))
            .build(prints)
            .into_iter()
            .next()
    }

    /// Index of the level `candidate` should merge into: the nearest level whose price lies
    /// within the merge threshold, or failing that the first level whose range overlaps.
    fn find_merge_target(
        &self,
        levels: &[Candidate],
        candidate: &Candidate,
        skip: Option<usize>,
    ) -> Option<usize> {
        let nearest = levels
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skip)
            .map(|(index, level)| (index, (level.price() - candidate.price()).abs()))
            .filter(|(_, distance)| *distance <= self.params.merge_threshold + PRICE_EPSILON)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, _)| index);

        nearest.or_else(|| {
            levels
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != skip)
                .find(|(_, level)| level.overlaps(candidate))
                .map(|(index, _)| index)
        })
    }

    /// Merge every level that the level at `index` has come within reach of, until stable.
    /// Returns the number of merges performed.
    fn cascade(
        &self,
        prints: &[(i64, WeightedPrint<'_>)],
        levels: &mut Vec<Candidate>,
        mut index: usize,
    ) -> usize {
        let mut merges = 0;
        while let Some(other) = self.find_merge_target(&levels[..], &levels[index], Some(index)) {
            levels[index] = merge(prints, &levels[index], &levels[other]);
            levels.swap_remove(other);
            if index == levels.len() {
                // The merged level was last and has been swapped into the removed slot
                index = other;
            }
            merges += 1;
        }
        merges
    }
}

/// Repeatedly merge the closest adjacent pair while it is closer than `min_gap`.
/// Returns the number of merges performed.
fn enforce_min_gap(
    prints: &[(i64, WeightedPrint<'_>)],
    levels: &mut Vec<Candidate>,
    min_gap: f64,
) -> usize {
    let mut merges = 0;
    while levels.len() >= 2 {
        levels.sort_by(|a, b| a.price().total_cmp(&b.price()));

        let Some((index, gap)) = levels
            .windows(2)
            .enumerate()
            .map(|(index, pair)| (index, pair[1].price() - pair[0].price()))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            break;
        };

        if gap >= min_gap - PRICE_EPSILON {
            break;
        }

        levels[index] = merge(prints, &levels[index], &levels[index + 1]);
        levels.remove(index + 1);
        merges += 1;
    }
    merges
}

/// Union of two candidates, statistics recomputed over the combined range.
fn merge(prints: &[(i64, WeightedPrint<'_>)], a: &Candidate, b: &Candidate) -> Candidate {
    let low_key = a.low_key.min(b.low_key);
    let high_key = a.high_key.max(b.high_key);
    let stats =
        range_stats(prints, low_key, high_key).unwrap_or_else(|| combine(&a.stats, &b.stats));
    Candidate {
        low_key,
        high_key,
        stats,
        merged: true,
    }
}

fn combine(a: &RangeStats, b: &RangeStats) -> RangeStats {
    RangeStats {
        volume: a.volume + b.volume,
        price_volume: a.price_volume + b.price_volume,
        ticks: a.ticks + b.ticks,
        min_price: a.min_price.min(b.min_price),
        max_price: a.max_price.max(b.max_price),
        last_timestamp: a.last_timestamp.max(b.last_timestamp),
    }
}

/// Statistics of the keyed truth prints whose bucket lies within `[low_key, high_key]`.
fn range_stats(
    prints: &[(i64, WeightedPrint<'_>)],
    low_key: i64,
    high_key: i64,
) -> Option<RangeStats> {
    prints
        .iter()
        .filter(|(key, _)| (low_key..=high_key).contains(key))
        .fold(None, |acc: Option<RangeStats>, (_, print)| {
            let volume = print.weighted_volume();
            let stats = RangeStats {
                volume,
                price_volume: volume * print.price(),
                ticks: 1,
                min_price: print.price(),
                max_price: print.price(),
                last_timestamp: print.timestamp(),
            };
            Some(match acc {
                Some(acc) => combine(&acc, &stats),
                None => stats,
            })
        })
        .filter(|stats| stats.volume > 0.0)
}

/// Smallest price gap between any two levels, `None` for fewer than two levels.
pub fn min_pairwise_gap(levels: &[Volav]) -> Option<f64> {
    let mut prices: Vec<f64> = levels.iter().map(|level| level.price).collect();
    prices.sort_by(f64::total_cmp);
    prices
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .min_by(f64::total_cmp)
}
