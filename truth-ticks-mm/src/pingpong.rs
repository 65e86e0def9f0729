//! Two-anchor ping-pong detection.
//!
//! Each truth tick is assigned to the zone of the nearer anchor when it lies within half a bucket
//! of it, and ignored otherwise. Consecutive same-zone ticks collapse into one run, so the run
//! sequence strictly alternates between the zones:
//!
//! ```text
//! ticks: A A . B B A . A B
//! runs:  [A]   [B] [A] [B]
//! legs:     A->B B->A A->B
//! ```
//!
//! A leg is fast when the first tick of the new run follows the last tick of the previous run
//! within the leg limit. A fast cycle is two consecutive fast legs returning to the starting zone
//! within the cycle limit. Cycles are counted without overlap, a cycle's end run may start the
//! next.

use serde::{Deserialize, Serialize};
use truth_ticks::{Volav, WeightedPrint};

/// Price zone of an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Zone {
    A,
    B,
}

/// The two dominant levels of a timeframe, A below B.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AnchorPair {
    pub anchor_a: f64,
    pub anchor_b: f64,
    pub volume_a: f64,
    pub volume_b: f64,
}

impl AnchorPair {
    pub fn gap(&self) -> f64 {
        self.anchor_b - self.anchor_a
    }
}

/// Outcome of picking anchors from a ranked Volav set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchors {
    /// No level carries volume.
    Missing,
    /// One-sided market, effectively a gap of 0.
    Single(f64),
    Pair(AnchorPair),
}

impl Anchors {
    /// Pick the two highest-volume levels. `levels` must be ranked by volume descending.
    pub fn select(levels: &[Volav]) -> Self {
        match levels {
            [] => Self::Missing,
            [only] => Self::Single(only.price),
            [first, second, ..] => {
                let (low, high) = if first.price <= second.price {
                    (first, second)
                } else {
                    (second, first)
                };
                Self::Pair(AnchorPair {
                    anchor_a: low.price,
                    anchor_b: high.price,
                    volume_a: low.weighted_volume,
                    volume_b: high.weighted_volume,
                })
            }
        }
    }

    pub fn gap(&self) -> f64 {
        match self {
            Self::Pair(pair) => pair.gap(),
            Self::Missing | Self::Single(_) => 0.0,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Self::Missing => 0,
            Self::Single(_) => 1,
            Self::Pair(_) => 2,
        }
    }
}

/// Alternation statistics between two anchors.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PingPongResult {
    pub anchor_a: f64,
    pub anchor_b: f64,
    pub gap: f64,
    pub volume_a: f64,
    pub volume_b: f64,
    pub share_a: f64,
    pub share_b: f64,
    /// `1 - |vA - vB| / (vA + vB)`, within `[0, 1]`.
    pub balance: f64,
    /// Zone changes, fast or not.
    pub alternations: usize,
    pub fast_alternations: usize,
    pub fast_cycles: usize,
    pub avg_cycle_minutes: Option<f64>,
    /// Timestamp of the first tick of the most recent fast leg.
    pub last_fast_alternation: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
struct Run {
    zone: Zone,
    first: i64,
    last: i64,
}

/// Detects fast alternation between two anchors.
#[derive(Debug, Clone, Copy)]
pub struct PingPongDetector {
    max_leg_secs: i64,
    max_cycle_secs: i64,
}

impl PingPongDetector {
    pub fn new(max_leg_secs: i64, max_cycle_secs: i64) -> Self {
        Self {
            max_leg_secs,
            max_cycle_secs,
        }
    }

    /// Zone of a price given the anchors and half a bucket of tolerance. The nearer anchor wins
    /// when both are in reach, A on an exact tie.
    pub fn zone(pair: &AnchorPair, price: f64, half_bucket: f64) -> Option<Zone> {
        let distance_a = (price - pair.anchor_a).abs();
        let distance_b = (price - pair.anchor_b).abs();
        let in_a = distance_a <= half_bucket + 1e-9;
        let in_b = distance_b <= half_bucket + 1e-9;

        match (in_a, in_b) {
            (true, true) if distance_b < distance_a => Some(Zone::B),
            (true, _) => Some(Zone::A),
            (false, true) => Some(Zone::B),
            (false, false) => None,
        }
    }

    /// Analyse chronologically ordered prints against an anchor pair. Zero-weight prints are not
    /// truth ticks and never form runs.
    pub fn detect(
        &self,
        pair: &AnchorPair,
        prints: &[WeightedPrint<'_>],
        bucket_size: f64,
    ) -> PingPongResult {
        let runs = Self::runs(pair, prints, bucket_size / 2.0);

        let fast_leg: Vec<bool> = runs
            .windows(2)
            .map(|legs| legs[1].first.saturating_sub(legs[0].last) <= self.max_leg_secs)
            .collect();

        let fast_alternations = fast_leg.iter().filter(|fast| **fast).count();
        let last_fast_alternation = fast_leg
            .iter()
            .rposition(|fast| *fast)
            .map(|leg| runs[leg + 1].first);

        let mut cycle_secs = Vec::new();
        let mut start = 0;
        while start + 2 < runs.len() {
            let total = runs[start + 2].first.saturating_sub(runs[start].last);
            if fast_leg[start] && fast_leg[start + 1] && total <= self.max_cycle_secs {
                cycle_secs.push(total);
                start += 2;
            } else {
                start += 1;
            }
        }

        let avg_cycle_minutes = (!cycle_secs.is_empty())
            .then(|| cycle_secs.iter().sum::<i64>() as f64 / cycle_secs.len() as f64 / 60.0);

        let total_volume = pair.volume_a + pair.volume_b;
        let (share_a, share_b, balance) = if total_volume > 0.0 {
            (
                pair.volume_a / total_volume,
                pair.volume_b / total_volume,
                (1.0 - (pair.volume_a - pair.volume_b).abs() / total_volume).clamp(0.0, 1.0),
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        PingPongResult {
            anchor_a: pair.anchor_a,
            anchor_b: pair.anchor_b,
            gap: pair.gap(),
            volume_a: pair.volume_a,
            volume_b: pair.volume_b,
            share_a,
            share_b,
            balance,
            alternations: runs.len().saturating_sub(1),
            fast_alternations,
            fast_cycles: cycle_secs.len(),
            avg_cycle_minutes,
            last_fast_alternation,
        }
    }

    fn runs(pair: &AnchorPair, prints: &[WeightedPrint<'_>], half_bucket: f64) -> Vec<Run> {
        let mut runs: Vec<Run> = Vec::new();
        for print in prints.iter().filter(|print| print.is_truth()) {
            let Some(zone) = Self::zone(pair, print.price(), half_bucket) else {
                continue;
            };
            match runs.last_mut() {
                Some(run) if run.zone == zone => run.last = print.timestamp(),
                _ => runs.push(Run {
                    zone,
                    first: print.timestamp(),
                    last: print.timestamp(),
                }),
            }
        }
        runs
    }
}
