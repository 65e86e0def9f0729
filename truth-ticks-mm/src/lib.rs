/// Truth Ticks MM - market-making scoring on top of truth ticks
///
/// Turns the Volav structure of a timeframe into a tradeability decision:
/// - two-anchor ping-pong detection with fast alternation and fast cycle counting
/// - expected-value scoring from value, balance, recency and liquidity components
/// - live quote generation with benchmark-shock fraction stepping, or closed-market zones
/// - TRADEABLE_MM / BIAS_MM / EXCLUDED verdicts that always carry their reasons
///
/// [`MmEngine`] owns the shared tick store and runs the whole pipeline per symbol.
pub mod config;
pub mod engine;
pub mod pingpong;
pub mod quote;
pub mod score;
pub mod verdict;

// Re-export commonly used types for convenience
pub use config::{EngineConfig, MmConfig, QuoteConfig, ScoreWeights, SizingConfig, TargetCycles};
pub use engine::{MarketMode, MmEngine, MmScoreResult, ScoreRequest};
pub use pingpong::{AnchorPair, Anchors, PingPongDetector, PingPongResult, Zone};
pub use quote::{BenchmarkInputs, BookSnapshot, LiveQuotes, QuoteGenerator, QuotePlan};
pub use score::ScoreComponents;
pub use verdict::{Reason, Verdict, VerdictKind};
