//! Score components and their combination.

use crate::config::{ScoreWeights, SizingConfig};
use serde::{Deserialize, Serialize};

/// Sub-scores of a market-making score, each within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct ScoreComponents {
    pub value: f64,
    pub balance: f64,
    pub recency: f64,
    pub liquidity: f64,
}

impl ScoreComponents {
    /// Components with every value clamped to `[0, 1]`. NaN becomes 0.
    pub fn new(value: f64, balance: f64, recency: f64, liquidity: f64) -> Self {
        Self {
            value: unit(value),
            balance: unit(balance),
            recency: unit(recency),
            liquidity: unit(liquidity),
        }
    }

    /// Weighted score within `[0, 100]`.
    pub fn total(&self, weights: &ScoreWeights) -> f64 {
        let score = weights.value * self.value
            + weights.balance * self.balance
            + weights.recency * self.recency
            + weights.liquidity * self.liquidity;
        (100.0 * score).clamp(0.0, 100.0)
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// `1 - e^(-mm_value / k)`.
pub fn value_score(mm_value: f64, k: f64) -> f64 {
    if mm_value <= 0.0 || k <= 0.0 {
        return 0.0;
    }
    unit(1.0 - (-mm_value / k).exp())
}

/// `e^(-minutes / decay)`, 0 when no fast alternation was ever observed.
pub fn recency_score(minutes_since_last_fast: Option<f64>, decay_minutes: f64) -> f64 {
    match minutes_since_last_fast {
        Some(minutes) if decay_minutes > 0.0 => unit((-minutes.max(0.0) / decay_minutes).exp()),
        _ => 0.0,
    }
}

/// `min(1, anchor_volume / adv / saturation_fraction)`, 0 for a non-positive ADV.
pub fn liquidity_score(
    anchor_volume: f64,
    average_daily_volume: f64,
    saturation_fraction: f64,
) -> f64 {
    if !(average_daily_volume > 0.0 && saturation_fraction > 0.0) {
        return 0.0;
    }
    unit(anchor_volume / average_daily_volume / saturation_fraction)
}

/// Order size as a whole number of lots: a fraction of the lighter anchor's volume, clamped to
/// the configured bounds.
pub fn suggested_size(lighter_anchor_volume: f64, config: &SizingConfig) -> u64 {
    let raw = (lighter_anchor_volume.max(0.0) * config.order_size_fraction) as u64;
    let lots = (raw / config.lot_size) * config.lot_size;
    lots.clamp(config.min_order_size, config.max_order_size)
}
