use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use truth_ticks::{ConfigError, Timeframe, TruthTicksConfig};

/// Minimum fast cycles a timeframe must show for a strict market-making verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetCycles {
    #[serde(rename = "4H")]
    pub four_hours: usize,
    #[serde(rename = "1D")]
    pub one_day: usize,
    #[serde(rename = "3D")]
    pub three_days: usize,
    #[serde(rename = "5D")]
    pub five_days: usize,
}

impl Default for TargetCycles {
    fn default() -> Self {
        Self {
            four_hours: 1,
            one_day: 2,
            three_days: 4,
            five_days: 6,
        }
    }
}

impl TargetCycles {
    pub fn for_timeframe(&self, timeframe: Timeframe) -> usize {
        match timeframe {
            Timeframe::FourHours => self.four_hours,
            Timeframe::OneDay => self.one_day,
            Timeframe::ThreeDays => self.three_days,
            Timeframe::FiveDays => self.five_days,
        }
    }
}

/// Weights of the score components. Must sum to 1 so the score stays within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub value: f64,
    pub balance: f64,
    pub recency: f64,
    pub liquidity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            value: 0.70,
            balance: 0.15,
            recency: 0.10,
            liquidity: 0.05,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_unit("weights.value", self.value)?;
        ConfigError::ensure_unit("weights.balance", self.balance)?;
        ConfigError::ensure_unit("weights.recency", self.recency)?;
        ConfigError::ensure_unit("weights.liquidity", self.liquidity)?;

        let total = self.value + self.balance + self.recency + self.liquidity;
        if (total - 1.0).abs() > 1e-6 {
            return Err(ConfigError::invalid("weights", total, "must sum to 1"));
        }
        Ok(())
    }
}

/// Live quote generation parameters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuoteConfig {
    /// Share of the spread captured inside the touch with no benchmark shock.
    pub base_fraction: Decimal,
    /// Added to the fraction for every shock threshold crossed.
    pub step_fraction: Decimal,
    pub max_fraction: Decimal,
    /// Benchmark change magnitudes (percent) at which the fraction steps up, ascending.
    pub shock_thresholds: Vec<f64>,
    pub min_market_spread: Decimal,
    /// Minimum distance between the generated buy and sell quotes.
    pub min_order_gap: Decimal,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_fraction: Decimal::new(15, 2),
            step_fraction: Decimal::new(3, 2),
            max_fraction: Decimal::new(30, 2),
            shock_thresholds: vec![0.25, 0.50, 0.75, 1.00, 1.50],
            min_market_spread: Decimal::new(6, 2),
            min_order_gap: Decimal::new(4, 2),
        }
    }
}

impl QuoteConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = Decimal::ONE;
        for (field, value) in [
            ("quote.base_fraction", self.base_fraction),
            ("quote.step_fraction", self.step_fraction),
            ("quote.max_fraction", self.max_fraction),
        ] {
            if value.is_sign_negative() || value > unit {
                return Err(ConfigError::invalid(
                    field,
                    decimal_f64(value),
                    "must be within [0, 1]",
                ));
            }
        }
        if self.base_fraction > self.max_fraction {
            return Err(ConfigError::invalid(
                "quote.base_fraction",
                decimal_f64(self.base_fraction),
                "must not exceed quote.max_fraction",
            ));
        }
        // Captured fractions above one half would cross the quotes
        if self.max_fraction >= Decimal::new(5, 1) {
            return Err(ConfigError::invalid(
                "quote.max_fraction",
                decimal_f64(self.max_fraction),
                "must be below 0.5",
            ));
        }
        if self.min_market_spread.is_sign_negative() || self.min_order_gap.is_sign_negative() {
            return Err(ConfigError::invalid(
                "quote.min_market_spread",
                decimal_f64(self.min_market_spread.min(self.min_order_gap)),
                "spread thresholds must not be negative",
            ));
        }
        for window in self.shock_thresholds.windows(2) {
            if window[1] <= window[0] {
                return Err(ConfigError::invalid(
                    "quote.shock_thresholds",
                    window[1],
                    "must be strictly ascending",
                ));
            }
        }
        for threshold in &self.shock_thresholds {
            ConfigError::ensure_positive("quote.shock_thresholds", *threshold)?;
        }
        Ok(())
    }
}

fn decimal_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(f64::NAN)
}

/// Suggested order size parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Fraction of the lighter anchor's weighted volume offered per order.
    pub order_size_fraction: f64,
    pub lot_size: u64,
    pub min_order_size: u64,
    pub max_order_size: u64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            order_size_fraction: 0.10,
            lot_size: 100,
            min_order_size: 100,
            max_order_size: 1_000,
        }
    }
}

impl SizingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_unit("sizing.order_size_fraction", self.order_size_fraction)?;
        if self.lot_size == 0 {
            return Err(ConfigError::invalid("sizing.lot_size", 0.0, "must be at least 1"));
        }
        if self.min_order_size > self.max_order_size {
            return Err(ConfigError::invalid(
                "sizing.min_order_size",
                self.min_order_size as f64,
                "must not exceed sizing.max_order_size",
            ));
        }
        Ok(())
    }
}

/// Market-making scoring configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MmConfig {
    /// Minimum price gap between the two anchors.
    pub min_anchor_gap: f64,
    /// Round-trip cost subtracted from the anchor gap.
    pub commission_buffer: f64,
    pub max_leg_minutes: f64,
    pub max_cycle_minutes: f64,
    pub target_cycles: TargetCycles,
    /// Value score constant `K` in `1 - e^(-mm_value / K)`.
    pub value_k: f64,
    /// Decay constant of the recency score in minutes.
    pub recency_decay_minutes: f64,
    /// Anchor volume over ADV at which the liquidity score saturates.
    pub liquidity_adv_fraction: f64,
    pub min_net_edge: f64,
    pub min_mm_value: f64,
    /// Balance that qualifies a pair without fast cycles for the watchlist.
    pub bias_min_balance: f64,
    /// Gap that qualifies an untested pair for the watchlist.
    pub bias_min_gap: f64,
    /// Timeframe scored when a request does not name one.
    pub default_timeframe: Timeframe,
    /// Trading days a closed-market projection may spread the 5D cycle count over.
    pub max_projection_days: usize,
    pub weights: ScoreWeights,
    pub quote: QuoteConfig,
    pub sizing: SizingConfig,
}

impl Default for MmConfig {
    fn default() -> Self {
        Self {
            min_anchor_gap: 0.06,
            commission_buffer: 0.04,
            max_leg_minutes: 30.0,
            max_cycle_minutes: 60.0,
            target_cycles: TargetCycles::default(),
            value_k: 0.20,
            recency_decay_minutes: 120.0,
            liquidity_adv_fraction: 0.20,
            min_net_edge: 0.04,
            min_mm_value: 0.05,
            bias_min_balance: 0.60,
            bias_min_gap: 0.10,
            default_timeframe: Timeframe::OneDay,
            max_projection_days: 5,
            weights: ScoreWeights::default(),
            quote: QuoteConfig::default(),
            sizing: SizingConfig::default(),
        }
    }
}

impl MmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_positive("min_anchor_gap", self.min_anchor_gap)?;
        if !(self.commission_buffer.is_finite() && self.commission_buffer >= 0.0) {
            return Err(ConfigError::invalid(
                "commission_buffer",
                self.commission_buffer,
                "must not be negative",
            ));
        }
        ConfigError::ensure_positive("max_leg_minutes", self.max_leg_minutes)?;
        ConfigError::ensure_positive("max_cycle_minutes", self.max_cycle_minutes)?;
        if self.max_cycle_minutes < self.max_leg_minutes {
            return Err(ConfigError::invalid(
                "max_cycle_minutes",
                self.max_cycle_minutes,
                "must not be shorter than max_leg_minutes",
            ));
        }
        ConfigError::ensure_positive("value_k", self.value_k)?;
        ConfigError::ensure_positive("recency_decay_minutes", self.recency_decay_minutes)?;
        ConfigError::ensure_positive("liquidity_adv_fraction", self.liquidity_adv_fraction)?;
        ConfigError::ensure_positive("min_net_edge", self.min_net_edge)?;
        ConfigError::ensure_positive("min_mm_value", self.min_mm_value)?;
        ConfigError::ensure_unit("bias_min_balance", self.bias_min_balance)?;
        ConfigError::ensure_positive("bias_min_gap", self.bias_min_gap)?;
        if self.max_projection_days == 0 {
            return Err(ConfigError::invalid(
                "max_projection_days",
                0.0,
                "must be at least 1",
            ));
        }
        self.weights.validate()?;
        self.quote.validate()?;
        self.sizing.validate()
    }

    pub fn max_leg_secs(&self) -> i64 {
        (self.max_leg_minutes * 60.0).round() as i64
    }

    pub fn max_cycle_secs(&self) -> i64 {
        (self.max_cycle_minutes * 60.0).round() as i64
    }
}

/// Complete engine configuration as loaded at startup.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub truth_ticks: TruthTicksConfig,
    pub mm: MmConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.truth_ticks.validate()?;
        self.mm.validate()
    }

    /// Parse and validate a JSON configuration document. Missing sections keep their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }
}
