/// Truth Ticks - price structure of thinly-traded instruments
///
/// Infers the true two-sided price structure of an illiquid instrument from a noisy, low-volume
/// stream of trade prints:
/// - bounded per-symbol tick storage with concurrent writers and readers
/// - print realism weighting by size and venue
/// - volume-averaged price levels (Volavs) with a minimum-gap guarantee
/// - anchor-based timeframe windows, optionally clipped to trading sessions
/// - drift measurement and market state classification
///
/// Everything downstream of the [`TickStore`] is a pure function over a snapshot.
pub mod calendar;
pub mod config;
pub mod drift;
pub mod error;
pub mod metrics;
pub mod print;
pub mod realism;
pub mod store;
pub mod timeframe;
pub mod volav;

// Re-export commonly used types for convenience
pub use calendar::{SessionCalendar, TradingCalendar};
pub use config::{DriftConfig, RealismConfig, StepTable, StepTier, TruthTicksConfig};
pub use drift::{Classification, Drift, MarketState, classify};
pub use error::ConfigError;
pub use metrics::{TimeframeMetrics, TruthTicksAnalyzer, WindowAnalysis, calculate_vwap};
pub use print::{RawPrint, TradePrint, WeightedPrint};
pub use realism::RealismFilter;
pub use store::TickStore;
pub use timeframe::{Timeframe, TimeframeWindow, anchor_timestamp};
pub use volav::{PriceRange, Volav, VolavBuilder, VolavParams, min_pairwise_gap};
