//! [`MmEngine`] facade: tick ingestion plus the per-symbol scoring pipeline.
//!
//! A scoring pass takes one snapshot of the symbol's prints up front and runs windowing, Volavs,
//! drift, ping-pong, scoring, quoting and the verdict over that snapshot only.

use crate::{
    config::EngineConfig,
    pingpong::{Anchors, PingPongDetector, PingPongResult},
    quote::{BenchmarkInputs, BookSnapshot, QuoteGenerator, QuotePlan},
    score::{ScoreComponents, liquidity_score, recency_score, suggested_size, value_score},
    verdict::{Reason, Verdict, VerdictInputs, evaluate},
};
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{num::NonZeroUsize, thread};
use tracing::debug;
use truth_ticks::{
    ConfigError, MarketState, RawPrint, TickStore, Timeframe, TimeframeMetrics, TradePrint,
    TradingCalendar, TruthTicksAnalyzer, WindowAnalysis,
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whether the market is trading while the score is requested.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketMode {
    #[default]
    #[display("MARKET_OPEN")]
    MarketOpen,
    #[display("MARKET_CLOSED")]
    MarketClosed,
}

/// Per-call scoring inputs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScoreRequest {
    pub average_daily_volume: f64,
    #[serde(default)]
    pub mode: MarketMode,
    /// Timeframe to score, the configured default when absent.
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    /// Reference time for recency, the latest print when absent.
    #[serde(default)]
    pub now: Option<i64>,
    #[serde(default)]
    pub book: Option<BookSnapshot>,
    #[serde(default)]
    pub benchmark: Option<BenchmarkInputs>,
}

impl ScoreRequest {
    pub fn new(average_daily_volume: f64, mode: MarketMode) -> Self {
        Self {
            average_daily_volume,
            mode,
            timeframe: None,
            now: None,
            book: None,
            benchmark: None,
        }
    }

    pub fn with_timeframe(self, timeframe: Timeframe) -> Self {
        Self {
            timeframe: Some(timeframe),
            ..self
        }
    }

    pub fn with_now(self, now: i64) -> Self {
        Self {
            now: Some(now),
            ..self
        }
    }

    pub fn with_book(self, book: BookSnapshot) -> Self {
        Self {
            book: Some(book),
            ..self
        }
    }

    pub fn with_benchmark(self, benchmark: BenchmarkInputs) -> Self {
        Self {
            benchmark: Some(benchmark),
            ..self
        }
    }
}

/// Market-making score of one symbol.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MmScoreResult {
    pub symbol: SmolStr,
    pub timeframe: Timeframe,
    pub mode: MarketMode,
    /// Within `[0, 100]`.
    pub score: f64,
    pub gap: f64,
    pub net_gap: f64,
    pub expected_cycles: f64,
    pub mm_value: f64,
    pub components: ScoreComponents,
    /// Shares per order, 0 when the score is 0.
    pub suggested_size: u64,
    pub quote: QuotePlan,
    pub verdict: Verdict,
    pub tradeable_mm: bool,
    pub state: MarketState,
    pub confidence: f64,
    pub insufficient_data: bool,
    pub truth_tick_count: usize,
    pub ping_pong: Option<PingPongResult>,
    /// Gate, verdict and quoting reasons, without duplicates.
    pub reasons: Vec<Reason>,
}

impl MmScoreResult {
    pub fn has_reason(&self, predicate: impl Fn(&Reason) -> bool) -> bool {
        self.reasons.iter().any(predicate)
    }
}

/// Truth ticks and market-making engine over a shared [`TickStore`].
pub struct MmEngine {
    store: TickStore,
    config: EngineConfig,
    calendar: Option<Box<dyn TradingCalendar>>,
}

impl std::fmt::Debug for MmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmEngine")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("trading_hours", &self.calendar.is_some())
            .finish()
    }
}

impl Default for MmEngine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            store: TickStore::new(config.truth_ticks.tick_store_capacity),
            config,
            calendar: None,
        }
    }
}

impl MmEngine {
    /// Validate the configuration and create an engine with an empty store.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store: TickStore::new(config.truth_ticks.tick_store_capacity),
            config,
            calendar: None,
        })
    }

    /// Clip timeframe windows to the sessions of `calendar`.
    pub fn with_calendar(self, calendar: impl TradingCalendar + 'static) -> Self {
        Self {
            calendar: Some(Box::new(calendar)),
            ..self
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &TickStore {
        &self.store
    }

    /// See [`TickStore::add_print`].
    pub fn add_print(&self, symbol: &str, print: impl Into<RawPrint>) -> bool {
        self.store.add_print(symbol, print)
    }

    pub fn snapshot(&self, symbol: &str) -> Vec<TradePrint> {
        self.store.snapshot(symbol)
    }

    pub fn symbols(&self) -> Vec<SmolStr> {
        self.store.symbols()
    }

    fn analyzer(&self) -> TruthTicksAnalyzer<'_> {
        let analyzer = TruthTicksAnalyzer::new(&self.config.truth_ticks);
        match self.calendar.as_deref() {
            Some(calendar) => analyzer.with_calendar(calendar),
            None => analyzer,
        }
    }

    fn detector(&self) -> PingPongDetector {
        PingPongDetector::new(self.config.mm.max_leg_secs(), self.config.mm.max_cycle_secs())
    }

    /// Diagnostic metrics for every timeframe of the symbol, from one snapshot.
    pub fn timeframe_metrics(
        &self,
        symbol: &str,
        average_daily_volume: f64,
    ) -> Vec<TimeframeMetrics> {
        let prints = self.store.snapshot(symbol);
        self.analyzer().analyze(&prints, average_daily_volume)
    }

    /// Score the symbol on a snapshot of its current prints.
    pub fn score(&self, symbol: &str, request: &ScoreRequest) -> MmScoreResult {
        let prints = self.store.snapshot(symbol);
        self.score_snapshot(symbol, &prints, request)
    }

    /// Score several independent symbols in parallel, preserving request order. A panic in any
    /// worker is resumed on the calling thread.
    pub fn score_many(&self, requests: &[(SmolStr, ScoreRequest)]) -> Vec<MmScoreResult> {
        if requests.is_empty() {
            return Vec::new();
        }
        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let chunk_size = requests.len().div_ceil(workers).max(1);

        thread::scope(|scope| {
            let handles: Vec<_> = requests
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|(symbol, request)| self.score(symbol, request))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect()
        })
    }

    /// Score a symbol over an explicit print history. Pure: the store is not consulted.
    pub fn score_snapshot(
        &self,
        symbol: &str,
        prints: &[TradePrint],
        request: &ScoreRequest,
    ) -> MmScoreResult {
        let mm = &self.config.mm;
        let adv = request.average_daily_volume;
        let timeframe = request.timeframe.unwrap_or(mm.default_timeframe);
        let analyzer = self.analyzer();
        let detector = self.detector();

        let analysis = analyzer.analyze_timeframe(prints, timeframe, adv);
        let metrics = &analysis.metrics;

        let anchors = Anchors::select(&metrics.volavs);
        let ping_pong = match anchors {
            Anchors::Pair(pair) => {
                Some(detector.detect(&pair, &analysis.weighted, metrics.bucket_size))
            }
            Anchors::Missing | Anchors::Single(_) => None,
        };

        let gap = anchors.gap();
        let net_gap = (gap - mm.commission_buffer).max(0.0);
        let expected_cycles = match request.mode {
            MarketMode::MarketOpen => ping_pong
                .as_ref()
                .map_or(0.0, |result| result.fast_cycles as f64),
            MarketMode::MarketClosed if timeframe == Timeframe::FiveDays => {
                self.projected_daily_cycles(&analysis)
            }
            MarketMode::MarketClosed => {
                let five_days = analyzer.analyze_timeframe(prints, Timeframe::FiveDays, adv);
                self.projected_daily_cycles(&five_days)
            }
        };
        let mm_value = net_gap * expected_cycles;

        let gate = match anchors {
            Anchors::Missing => Some(Reason::NoValidAnchors),
            _ if gap < mm.min_anchor_gap => Some(Reason::GapTooNarrow {
                gap,
                min: mm.min_anchor_gap,
            }),
            _ if net_gap <= 0.0 => Some(Reason::NoEdgeAfterCosts {
                gap,
                commission_buffer: mm.commission_buffer,
            }),
            _ => None,
        };

        let (components, score, size) = match (&gate, &ping_pong) {
            (None, Some(result)) => {
                let now = request.now.unwrap_or(metrics.window_end);
                let minutes_since_fast = result
                    .last_fast_alternation
                    .map(|timestamp| now.saturating_sub(timestamp) as f64 / 60.0);
                let components = ScoreComponents::new(
                    value_score(mm_value, mm.value_k),
                    result.balance,
                    recency_score(minutes_since_fast, mm.recency_decay_minutes),
                    liquidity_score(
                        result.volume_a + result.volume_b,
                        adv,
                        mm.liquidity_adv_fraction,
                    ),
                );
                let score = components.total(&mm.weights);
                let size = if score > 0.0 {
                    suggested_size(result.volume_a.min(result.volume_b), &mm.sizing)
                } else {
                    0
                };
                (components, score, size)
            }
            _ => (ScoreComponents::default(), 0.0, 0),
        };

        if let Some(reason) = &gate {
            debug!(%symbol, %timeframe, %reason, "market-making gate failed");
        }

        let quote = match (&gate, anchors, request.mode) {
            (Some(reason), _, _) => QuotePlan::Unavailable {
                reason: reason.clone(),
            },
            (None, Anchors::Pair(pair), MarketMode::MarketClosed) => QuotePlan::zones(&pair),
            (None, _, _) => match QuoteGenerator::new(&mm.quote)
                .quote(request.book.as_ref(), request.benchmark.as_ref())
            {
                Ok(quotes) => QuotePlan::Live(quotes),
                Err(reason) => QuotePlan::Unavailable { reason },
            },
        };

        let target_timeframe = match request.mode {
            MarketMode::MarketOpen => timeframe,
            MarketMode::MarketClosed => Timeframe::OneDay,
        };
        let verdict = evaluate(
            &VerdictInputs {
                anchor_count: anchors.count(),
                gap,
                net_gap,
                expected_cycles,
                target_cycles: mm.target_cycles.for_timeframe(target_timeframe),
                mm_value,
                fast_cycles: ping_pong.as_ref().map_or(0, |result| result.fast_cycles),
                balance: ping_pong.as_ref().map_or(0.0, |result| result.balance),
            },
            mm,
        );

        let tradeable_mm = verdict.is_tradeable()
            && (request.mode == MarketMode::MarketClosed || quote.live().is_some());

        let reasons = gate
            .iter()
            .chain(&verdict.reasons)
            .chain(quote.unavailable_reason())
            .cloned()
            .fold(Vec::new(), |mut reasons, reason| {
                if !reasons.contains(&reason) {
                    reasons.push(reason);
                }
                reasons
            });

        debug!(
            %symbol,
            %timeframe,
            mode = %request.mode,
            score,
            verdict = %verdict.kind,
            tradeable_mm,
            "scored symbol"
        );

        MmScoreResult {
            symbol: SmolStr::new(symbol),
            timeframe,
            mode: request.mode,
            score,
            gap,
            net_gap,
            expected_cycles,
            mm_value,
            components,
            suggested_size: size,
            quote,
            verdict,
            tradeable_mm,
            state: metrics.state,
            confidence: metrics.confidence,
            insufficient_data: metrics.insufficient_data,
            truth_tick_count: metrics.truth_tick_count,
            ping_pong,
            reasons,
        }
    }

    /// Fast cycles of the 5D window spread over the trading days its truth ticks span.
    fn projected_daily_cycles(&self, week: &WindowAnalysis<'_>) -> f64 {
        let Anchors::Pair(pair) = Anchors::select(&week.metrics.volavs) else {
            return 0.0;
        };
        let cycles = self
            .detector()
            .detect(&pair, &week.weighted, week.metrics.bucket_size)
            .fast_cycles;

        let days = week
            .truth_ticks()
            .map(|print| print.timestamp().div_euclid(SECONDS_PER_DAY))
            .unique()
            .count()
            .clamp(1, self.config.mm.max_projection_days);

        cycles as f64 / days as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ADV: f64 = 5_000.0;
    const START: i64 = 1_704_897_000;

    fn alternate(engine: &MmEngine, symbol: &str, count: i64, start: i64, step_secs: i64) {
        for index in 0..count {
            let price = if index % 2 == 0 { 10.00 } else { 10.10 };
            let print = TradePrint::new(start + index * step_secs, price, 100.0, None);
            assert!(engine.add_print(symbol, print));
        }
    }

    #[test]
    fn test_score_unknown_symbol() {
        let engine = MmEngine::default();
        let result = engine.score("NOPE", &ScoreRequest::new(ADV, MarketMode::MarketOpen));

        assert_eq!(result.score, 0.0);
        assert!(result.insufficient_data);
        assert_eq!(result.state, MarketState::InsufficientData);
        assert_eq!(result.verdict.kind, crate::VerdictKind::Excluded);
        assert_eq!(result.reasons, vec![Reason::NoValidAnchors]);
        assert!(!result.tradeable_mm);
    }

    #[test]
    fn test_live_score_with_quotes() {
        let engine = MmEngine::default();
        alternate(&engine, "PFF-A", 20, START, 300);

        let request = ScoreRequest::new(ADV, MarketMode::MarketOpen)
            .with_book(BookSnapshot::new(dec!(10.00), dec!(10.12)));
        let result = engine.score("PFF-A", &request);

        assert!(result.score > 0.0 && result.score <= 100.0);
        assert_eq!(result.timeframe, Timeframe::OneDay);
        assert!(result.verdict.is_tradeable());
        assert!(result.tradeable_mm);
        assert!(!result.insufficient_data);
        let quotes = result.quote.live().unwrap();
        assert_eq!(quotes.buy, dec!(10.02));
        assert_eq!(quotes.sell, dec!(10.10));
        assert_eq!(result.suggested_size, 100);
        assert_eq!(result.components.recency, 1.0);
    }

    #[test]
    fn test_recency_uses_caller_time() {
        let engine = MmEngine::default();
        alternate(&engine, "PFF-A", 6, START, 300);
        let last = START + 5 * 300;

        let fresh = engine.score("PFF-A", &ScoreRequest::new(ADV, MarketMode::MarketOpen));
        let stale = engine.score(
            "PFF-A",
            &ScoreRequest::new(ADV, MarketMode::MarketOpen).with_now(last + 120 * 60),
        );

        assert_eq!(fresh.components.recency, 1.0);
        assert!((stale.components.recency - (-1.0f64).exp()).abs() < 1e-9);
        assert!(stale.score < fresh.score);
    }

    #[test]
    fn test_closed_market_projects_cycles_and_zones() {
        let engine = MmEngine::default();
        // Two trading days with two fast cycles each
        alternate(&engine, "PFF-B", 5, START, 300);
        alternate(&engine, "PFF-B", 5, START + SECONDS_PER_DAY, 300);

        let result = engine.score("PFF-B", &ScoreRequest::new(ADV, MarketMode::MarketClosed));

        assert_eq!(result.mode, MarketMode::MarketClosed);
        assert_eq!(result.expected_cycles, 2.0);
        assert_eq!(
            result.quote,
            QuotePlan::Zones { buy_zone: dec!(10.00), sell_zone: dec!(10.10) }
        );
        assert!(result.tradeable_mm);
    }

    #[test]
    fn test_timeframe_metrics() {
        let engine = MmEngine::default();
        alternate(&engine, "PFF-A", 20, START, 300);

        let metrics = engine.timeframe_metrics("PFF-A", ADV);
        let timeframes: Vec<Timeframe> = metrics.iter().map(|metric| metric.timeframe).collect();
        assert_eq!(timeframes, Timeframe::ALL.to_vec());
        assert!(metrics.iter().all(|metric| metric.volavs.len() == 2));
    }

    #[test]
    fn test_score_many_preserves_order() {
        let engine = MmEngine::default();
        alternate(&engine, "AAA", 20, START, 300);
        engine.add_print("BBB", TradePrint::new(START, 25.0, 50.0, None));

        let requests: Vec<(SmolStr, ScoreRequest)> = ["AAA", "BBB", "CCC"]
            .into_iter()
            .map(|symbol| (SmolStr::new(symbol), ScoreRequest::new(ADV, MarketMode::MarketOpen)))
            .collect();
        let results = engine.score_many(&requests);

        let symbols: Vec<&str> = results.iter().map(|result| result.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB", "CCC"]);
        assert!(results[0].score > 0.0);
        assert_eq!(results[1].score, 0.0);
        assert_eq!(results[2].score, 0.0);
    }

    #[test]
    fn test_score_many_returns_one_result_per_request() {
        let engine = MmEngine::default();
        alternate(&engine, "AAA", 20, START, 300);

        let symbols: Vec<SmolStr> = (0..64)
            .map(|index| match index % 3 {
                0 => SmolStr::new("AAA"),
                _ => SmolStr::new(format!("S{index}")),
            })
            .collect();
        let requests: Vec<(SmolStr, ScoreRequest)> = symbols
            .iter()
            .map(|symbol| (symbol.clone(), ScoreRequest::new(ADV, MarketMode::MarketOpen)))
            .collect();
        let results = engine.score_many(&requests);

        assert_eq!(results.len(), requests.len());
        for (index, (result, symbol)) in results.iter().zip(&symbols).enumerate() {
            assert_eq!(&result.symbol, symbol, "TC{} failed", index);
            assert_eq!(result.score > 0.0, index % 3 == 0, "TC{} failed", index);
        }
    }

    #[test]
    fn test_extreme_caller_time_does_not_overflow() {
        let engine = MmEngine::default();
        alternate(&engine, "PFF-A", 20, START, 300);

        for now in [i64::MIN, i64::MAX] {
            let result = engine.score(
                "PFF-A",
                &ScoreRequest::new(ADV, MarketMode::MarketOpen).with_now(now),
            );
            assert!((0.0..=100.0).contains(&result.score));
            assert!((0.0..=1.0).contains(&result.components.recency));
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.mm.value_k = 0.0;
        assert!(MmEngine::new(config).is_err());
    }

    #[test]
    fn test_score_request_deserialize() {
        let request: ScoreRequest = serde_json::from_str(
            r#"{
                "average_daily_volume": 5000,
                "mode": "MARKET_CLOSED",
                "timeframe": "5D",
                "book": { "bid": "10.00", "ask": "10.12" }
            }"#,
        )
        .unwrap();

        assert_eq!(request.mode, MarketMode::MarketClosed);
        assert_eq!(request.timeframe, Some(Timeframe::FiveDays));
        assert_eq!(request.book.unwrap().spread(), Some(dec!(0.12)));
        assert_eq!(request.now, None);
    }
}
