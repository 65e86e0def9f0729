//! Configuration for the truth tick pipeline.
//!
//! Every struct deserializes with `#[serde(default)]`, so a config file only needs to name the
//! options it overrides. Call [`TruthTicksConfig::validate`] once at startup; analysis code
//! assumes a validated config and never re-checks it.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// One `(min_adv, value)` tier of a [`StepTable`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct StepTier {
    pub min_adv: f64,
    pub value: f64,
}

impl StepTier {
    pub const fn new(min_adv: f64, value: f64) -> Self {
        Self { min_adv, value }
    }
}

/// Ordered average-daily-volume step table with first-match semantics.
///
/// Tiers are held in strictly descending `min_adv` order and must end with a catch-all tier at
/// `min_adv = 0`. A lookup walks the tiers and returns the value of the first tier whose
/// threshold the ADV meets.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct StepTable(Vec<StepTier>);

impl StepTable {
    /// Construct a validated table.
    pub fn new(name: &str, tiers: Vec<StepTier>) -> Result<Self, ConfigError> {
        let table = Self(tiers);
        table.validate(name)?;
        Ok(table)
    }

    /// Default ADV → bucket size table. Thinner names get coarser buckets.
    pub fn default_bucket_sizes() -> Self {
        Self(vec![
            StepTier::new(100_000.0, 0.03),
            StepTier::new(50_000.0, 0.04),
            StepTier::new(20_000.0, 0.05),
            StepTier::new(10_000.0, 0.06),
            StepTier::new(3_000.0, 0.07),
            StepTier::new(1_000.0, 0.09),
            StepTier::new(0.0, 0.15),
        ])
    }

    /// Default ADV → minimum level gap table.
    pub fn default_min_gaps() -> Self {
        Self(vec![
            StepTier::new(100_000.0, 0.04),
            StepTier::new(20_000.0, 0.05),
            StepTier::new(3_000.0, 0.06),
            StepTier::new(0.0, 0.08),
        ])
    }

    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let Some(last) = self.0.last() else {
            return Err(ConfigError::EmptyStepTable {
                table: name.to_string(),
            });
        };

        for tier in &self.0 {
            ConfigError::ensure_positive(&format!("{name}.value"), tier.value)?;
            if !tier.min_adv.is_finite() || tier.min_adv < 0.0 {
                return Err(ConfigError::invalid(
                    format!("{name}.min_adv"),
                    tier.min_adv,
                    "must be finite and non-negative",
                ));
            }
        }

        for pair in self.0.windows(2) {
            if pair[1].min_adv >= pair[0].min_adv {
                return Err(ConfigError::UnorderedStepTable {
                    table: name.to_string(),
                    previous: pair[0].min_adv,
                    next: pair[1].min_adv,
                });
            }
        }

        if last.min_adv != 0.0 {
            return Err(ConfigError::MissingCatchAll {
                table: name.to_string(),
                last: last.min_adv,
            });
        }

        Ok(())
    }

    /// Value of the first tier whose threshold `adv` meets.
    ///
    /// A non-finite or negative ADV falls through to the coarsest (last) tier.
    pub fn lookup(&self, adv: f64) -> f64 {
        self.0
            .iter()
            .find(|tier| adv >= tier.min_adv)
            .or(self.0.last())
            .map(|tier| tier.value)
            .unwrap_or_default()
    }

    pub fn tiers(&self) -> &[StepTier] {
        &self.0
    }
}

/// Print realism weighting policy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RealismConfig {
    /// Prints smaller than this carry zero weight.
    pub min_size: f64,
    /// Venue whose prints are internally crossed and treated like unknown venues.
    pub internal_venue: SmolStr,
    /// Sizes treated as fully representative on internal/unknown venues.
    pub round_lots: Vec<f64>,
    pub round_lot_unit: f64,
    /// Smallest multiple of `round_lot_unit` given the large round-lot weight.
    pub large_round_lot_min: f64,
    pub large_round_lot_weight: f64,
    pub odd_size_weight: f64,
}

impl Default for RealismConfig {
    fn default() -> Self {
        Self {
            min_size: 20.0,
            internal_venue: SmolStr::new_static("FNRA"),
            round_lots: vec![100.0, 200.0],
            round_lot_unit: 100.0,
            large_round_lot_min: 300.0,
            large_round_lot_weight: 0.4,
            odd_size_weight: 0.2,
        }
    }
}

impl RealismConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_positive("realism.min_size", self.min_size)?;
        ConfigError::ensure_positive("realism.round_lot_unit", self.round_lot_unit)?;
        ConfigError::ensure_positive("realism.large_round_lot_min", self.large_round_lot_min)?;
        ConfigError::ensure_unit("realism.large_round_lot_weight", self.large_round_lot_weight)?;
        ConfigError::ensure_unit("realism.odd_size_weight", self.odd_size_weight)?;
        for lot in &self.round_lots {
            ConfigError::ensure_positive("realism.round_lots", *lot)?;
        }
        Ok(())
    }
}

/// Thresholds of the drift & state decision table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Share of the window's truth ticks used for the start and end levels.
    pub edge_fraction: f64,
    pub high_volume_fraction: f64,
    pub low_volume_fraction: f64,
    /// Largest |normalized displacement| still read as absorption.
    pub absorption_max_displacement: f64,
    pub dominant_displacement: f64,
    pub strong_dominant_displacement: f64,
    /// Confidence ceiling of an `INSUFFICIENT_DATA` result.
    pub insufficient_confidence: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            edge_fraction: 0.20,
            high_volume_fraction: 0.80,
            low_volume_fraction: 0.20,
            absorption_max_displacement: 0.30,
            dominant_displacement: 0.40,
            strong_dominant_displacement: 1.50,
            insufficient_confidence: 0.15,
        }
    }
}

impl DriftConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_unit("drift.edge_fraction", self.edge_fraction)?;
        ConfigError::ensure_positive("drift.high_volume_fraction", self.high_volume_fraction)?;
        ConfigError::ensure_positive("drift.low_volume_fraction", self.low_volume_fraction)?;
        ConfigError::ensure_positive(
            "drift.absorption_max_displacement",
            self.absorption_max_displacement,
        )?;
        ConfigError::ensure_positive("drift.dominant_displacement", self.dominant_displacement)?;
        ConfigError::ensure_unit("drift.insufficient_confidence", self.insufficient_confidence)?;

        if self.low_volume_fraction >= self.high_volume_fraction {
            return Err(ConfigError::invalid(
                "drift.low_volume_fraction",
                self.low_volume_fraction,
                "must be below high_volume_fraction",
            ));
        }
        if self.strong_dominant_displacement <= self.dominant_displacement {
            return Err(ConfigError::invalid(
                "drift.strong_dominant_displacement",
                self.strong_dominant_displacement,
                "must exceed dominant_displacement",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration of the truth tick pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TruthTicksConfig {
    pub tick_store_capacity: usize,
    pub min_ticks_per_window: usize,
    /// Maximum number of Volav levels retained per computation.
    pub top_n: usize,
    /// Merge threshold as a fraction of the minimum gap.
    pub merge_threshold_ratio: f64,
    pub bucket_sizes: StepTable,
    pub min_gaps: StepTable,
    pub realism: RealismConfig,
    pub drift: DriftConfig,
}

impl Default for TruthTicksConfig {
    fn default() -> Self {
        Self {
            tick_store_capacity: 200,
            min_ticks_per_window: 15,
            top_n: 4,
            merge_threshold_ratio: 0.90,
            bucket_sizes: StepTable::default_bucket_sizes(),
            min_gaps: StepTable::default_min_gaps(),
            realism: RealismConfig::default(),
            drift: DriftConfig::default(),
        }
    }
}

impl TruthTicksConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_store_capacity == 0 {
            return Err(ConfigError::invalid(
                "tick_store_capacity",
                0.0,
                "must be at least 1",
            ));
        }
        if self.min_ticks_per_window == 0 {
            return Err(ConfigError::invalid(
                "min_ticks_per_window",
                0.0,
                "must be at least 1",
            ));
        }
        if self.top_n == 0 {
            return Err(ConfigError::invalid("top_n", 0.0, "must be at least 1"));
        }
        ConfigError::ensure_unit("merge_threshold_ratio", self.merge_threshold_ratio)?;
        self.bucket_sizes.validate("bucket_sizes")?;
        self.min_gaps.validate("min_gaps")?;
        self.realism.validate()?;
        self.drift.validate()
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn bucket_size(&self, average_daily_volume: f64) -> f64 {
        self.bucket_sizes.lookup(average_daily_volume)
    }

    pub fn min_gap(&self, average_daily_volume: f64) -> f64 {
        self.min_gaps.lookup(average_daily_volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(TruthTicksConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_step_table_first_match() {
        struct TestCase {
            adv: f64,
            expected_bucket: f64,
            expected_gap: f64,
        }

        let config = TruthTicksConfig::default();
        let tests = vec![
            // TC0: very liquid
            TestCase {
                adv: 250_000.0,
                expected_bucket: 0.03,
                expected_gap: 0.04,
            },
            // TC1: exactly on a threshold
            TestCase {
                adv: 100_000.0,
                expected_bucket: 0.03,
                expected_gap: 0.04,
            },
            // TC2: mid tier
            TestCase {
                adv: 5_000.0,
                expected_bucket: 0.07,
                expected_gap: 0.06,
            },
            // TC3: thin
            TestCase {
                adv: 1_500.0,
                expected_bucket: 0.09,
                expected_gap: 0.08,
            },
            // TC4: very thin
            TestCase {
                adv: 200.0,
                expected_bucket: 0.15,
                expected_gap: 0.08,
            },
            // TC5: garbage ADV falls to the coarsest tier
            TestCase {
                adv: f64::NAN,
                expected_bucket: 0.15,
                expected_gap: 0.08,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(config.bucket_size(test.adv), test.expected_bucket, "TC{} failed", index);
            assert_eq!(config.min_gap(test.adv), test.expected_gap, "TC{} failed", index);
        }
    }

    #[test]
    fn test_step_table_rejects_unordered_tiers() {
        let result = StepTable::new(
            "bucket_sizes",
            vec![
                StepTier::new(1_000.0, 0.05),
                StepTier::new(5_000.0, 0.03),
                StepTier::new(0.0, 0.1),
            ],
        );
        assert!(matches!(result, Err(ConfigError::UnorderedStepTable { .. })));
    }

    #[test]
    fn test_step_table_requires_catch_all() {
        let result = StepTable::new("min_gaps", vec![StepTier::new(1_000.0, 0.05)]);
        assert!(matches!(result, Err(ConfigError::MissingCatchAll { .. })));

        let result = StepTable::new("min_gaps", vec![]);
        assert!(matches!(result, Err(ConfigError::EmptyStepTable { .. })));
    }

    #[test]
    fn test_from_json_str_with_overrides() {
        let config = TruthTicksConfig::from_json_str(
            r#"{
                "top_n": 3,
                "realism": { "internal_venue": "ADF" },
                "min_gaps": [
                    { "min_adv": 10000.0, "value": 0.05 },
                    { "min_adv": 0.0, "value": 0.07 }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.top_n, 3);
        assert_eq!(config.realism.internal_venue, "ADF");
        assert_eq!(config.realism.min_size, 20.0);
        assert_eq!(config.min_gap(12_000.0), 0.05);
        assert_eq!(config.min_gap(500.0), 0.07);
        assert_eq!(config.tick_store_capacity, 200);
    }

    #[test]
    fn test_from_json_str_rejects_invalid() {
        let result = TruthTicksConfig::from_json_str(r#"{ "merge_threshold_ratio": 1.5 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = TruthTicksConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
