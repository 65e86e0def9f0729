//! Drift measurement and market state classification.
//!
//! Drift compares the dominant level of the earliest truth ticks in a window with the dominant
//! level of the latest ones. The state classifier is an ordered rule list evaluated first match
//! wins; each rule is a pure predicate over [`DriftInputs`] that yields a state and confidence.

use crate::{
    config::DriftConfig,
    print::WeightedPrint,
    volav::{VolavBuilder, VolavParams},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Classified state of a timeframe window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketState {
    #[display("INSUFFICIENT_DATA")]
    InsufficientData,
    #[display("BUYER_ABSORPTION")]
    BuyerAbsorption,
    #[display("SELLER_ABSORPTION")]
    SellerAbsorption,
    #[display("BUYER_VACUUM")]
    BuyerVacuum,
    #[display("SELLER_VACUUM")]
    SellerVacuum,
    #[display("STRONG_BUYER_DOMINANT")]
    StrongBuyerDominant,
    #[display("BUYER_DOMINANT")]
    BuyerDominant,
    #[display("STRONG_SELLER_DOMINANT")]
    StrongSellerDominant,
    #[display("SELLER_DOMINANT")]
    SellerDominant,
    #[display("NEUTRAL")]
    Neutral,
}

/// Start/end level comparison of a window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Drift {
    pub start_level: Option<f64>,
    pub end_level: Option<f64>,
    pub displacement: f64,
    /// Displacement in units of the minimum level gap.
    pub normalized_displacement: f64,
    /// Truth volume in the window over average daily volume.
    pub volume_fraction: f64,
}

impl Drift {
    /// Measure drift over chronologically ordered weighted prints.
    ///
    /// The first and last `edge_fraction` of the truth ticks (at least one each) are reduced to
    /// their dominant Volav. Non-positive ADV yields a volume fraction of 0.
    pub fn measure(
        prints: &[WeightedPrint<'_>],
        params: VolavParams,
        average_daily_volume: f64,
        config: &DriftConfig,
    ) -> Self {
        let truth: Vec<WeightedPrint<'_>> = prints
            .iter()
            .copied()
            .filter(WeightedPrint::is_truth)
            .collect();

        let truth_volume: f64 = truth.iter().map(WeightedPrint::weighted_volume).sum();
        let volume_fraction = if average_daily_volume.is_finite() && average_daily_volume > 0.0 {
            truth_volume / average_daily_volume
        } else {
            0.0
        };

        if truth.is_empty() {
            return Self {
                volume_fraction,
                ..Self::default()
            };
        }

        let edge = ((truth.len() as f64 * config.edge_fraction).floor() as usize)
            .clamp(1, truth.len());
        let builder = VolavBuilder::new(params.with_top_n(1));
        let start_level = builder.dominant(&truth[..edge]).map(|level| level.price);
        let end_level = builder
            .dominant(&truth[truth.len() - edge..])
            .map(|level| level.price);

        let displacement = match (start_level, end_level) {
            (Some(start), Some(end)) => end - start,
            _ => 0.0,
        };

        Self {
            start_level,
            end_level,
            displacement,
            normalized_displacement: displacement / params.min_gap,
            volume_fraction,
        }
    }
}

/// Everything the state rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftInputs {
    pub tick_count: usize,
    pub min_ticks: usize,
    pub volume_fraction: f64,
    pub displacement: f64,
    pub normalized_displacement: f64,
}

impl DriftInputs {
    pub fn new(drift: &Drift, tick_count: usize, min_ticks: usize) -> Self {
        Self {
            tick_count,
            min_ticks,
            volume_fraction: drift.volume_fraction,
            displacement: drift.displacement,
            normalized_displacement: drift.normalized_displacement,
        }
    }
}

/// Tagged result of the state classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub state: MarketState,
    pub confidence: f64,
    /// Name of the rule that matched.
    pub rule: &'static str,
}

type RuleFn = fn(&DriftInputs, &DriftConfig) -> Option<(MarketState, f64)>;

struct StateRule {
    name: &'static str,
    apply: RuleFn,
}

/// Evaluated in order, first match wins.
const STATE_RULES: &[StateRule] = &[
    StateRule {
        name: "insufficient_data",
        apply: insufficient_data,
    },
    StateRule {
        name: "absorption",
        apply: absorption,
    },
    StateRule {
        name: "vacuum",
        apply: vacuum,
    },
    StateRule {
        name: "dominance",
        apply: dominance,
    },
];

/// Classify a window's state from its drift inputs.
pub fn classify(inputs: &DriftInputs, config: &DriftConfig) -> Classification {
    STATE_RULES
        .iter()
        .find_map(|rule| {
            (rule.apply)(inputs, config).map(|(state, confidence)| Classification {
                state,
                confidence,
                rule: rule.name,
            })
        })
        .unwrap_or_else(|| Classification {
            state: MarketState::Neutral,
            confidence: neutral_confidence(inputs, config),
            rule: "neutral",
        })
}

fn insufficient_data(inputs: &DriftInputs, config: &DriftConfig) -> Option<(MarketState, f64)> {
    (inputs.tick_count < inputs.min_ticks).then(|| {
        let scale = inputs.tick_count as f64 / inputs.min_ticks.max(1) as f64;
        (
            MarketState::InsufficientData,
            (config.insufficient_confidence * scale).clamp(0.0, config.insufficient_confidence),
        )
    })
}

fn absorption(inputs: &DriftInputs, config: &DriftConfig) -> Option<(MarketState, f64)> {
    let displacement = inputs.normalized_displacement.abs();
    if inputs.volume_fraction <= config.high_volume_fraction
        || displacement >= config.absorption_max_displacement
    {
        return None;
    }

    let state = if inputs.displacement >= 0.0 {
        MarketState::BuyerAbsorption
    } else {
        MarketState::SellerAbsorption
    };
    let excess_volume = (inputs.volume_fraction - config.high_volume_fraction).min(2.0);
    let stillness = 1.0 - displacement / config.absorption_max_displacement;
    Some((state, bounded(0.60 + 0.15 * excess_volume + 0.10 * stillness, 0.60, 0.95)))
}

fn vacuum(inputs: &DriftInputs, config: &DriftConfig) -> Option<(MarketState, f64)> {
    if inputs.volume_fraction >= config.low_volume_fraction {
        return None;
    }

    let state = if inputs.displacement > 0.0 {
        MarketState::BuyerVacuum
    } else if inputs.displacement < 0.0 {
        MarketState::SellerVacuum
    } else {
        return Some((MarketState::Neutral, bounded(0.25 + inputs.volume_fraction, 0.25, 0.45)));
    };
    let displacement = inputs.normalized_displacement.abs().min(2.0);
    Some((
        state,
        bounded(0.30 + 0.10 * displacement + 0.50 * inputs.volume_fraction, 0.30, 0.60),
    ))
}

fn dominance(inputs: &DriftInputs, config: &DriftConfig) -> Option<(MarketState, f64)> {
    let normalized = inputs.normalized_displacement;
    let displacement = normalized.abs();
    let volume = inputs.volume_fraction.min(1.0);

    if displacement >= config.strong_dominant_displacement {
        let state = if normalized > 0.0 {
            MarketState::StrongBuyerDominant
        } else {
            MarketState::StrongSellerDominant
        };
        let excess = displacement - config.strong_dominant_displacement;
        return Some((state, bounded(0.80 + 0.05 * excess + 0.10 * volume, 0.80, 0.98)));
    }

    if displacement >= config.dominant_displacement {
        let state = if normalized > 0.0 {
            MarketState::BuyerDominant
        } else {
            MarketState::SellerDominant
        };
        let progress = (displacement - config.dominant_displacement)
            / (config.strong_dominant_displacement - config.dominant_displacement);
        return Some((state, bounded(0.50 + 0.25 * progress + 0.15 * volume, 0.50, 0.95)));
    }

    None
}

fn neutral_confidence(inputs: &DriftInputs, config: &DriftConfig) -> f64 {
    let displacement = inputs.normalized_displacement.abs() / config.dominant_displacement;
    bounded(
        0.40 + 0.20 * inputs.volume_fraction.min(1.0) - 0.25 * displacement,
        0.10,
        0.60,
    )
}

fn bounded(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() { min } else { value.clamp(min, max) }
}
