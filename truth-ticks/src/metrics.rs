//! Per-timeframe truth tick metrics.
//!
//! [`TruthTicksAnalyzer`] runs the full pipeline for one symbol snapshot: window selection,
//! realism weighting, Volav clustering, drift measurement and state classification. Every
//! timeframe is computed from the same snapshot so results are mutually consistent.

use crate::{
    calendar::TradingCalendar,
    config::TruthTicksConfig,
    drift::{Drift, DriftInputs, MarketState, classify},
    print::{TradePrint, WeightedPrint},
    realism::RealismFilter,
    timeframe::{Timeframe, TimeframeWindow, anchor_timestamp},
    volav::{Volav, VolavBuilder, VolavParams},
};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Venue label used for prints the feed could not attribute.
pub const UNKNOWN_VENUE: &str = "UNKNOWN";

/// Truth tick metrics of one (symbol, timeframe) pair.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimeframeMetrics {
    pub timeframe: Timeframe,
    pub window_start: i64,
    /// Anchor: timestamp of the latest print in the snapshot.
    pub window_end: i64,
    /// Every print in the window, including zero-weight ones.
    pub seen_count: usize,
    pub truth_tick_count: usize,
    pub truth_volume: f64,
    pub vwap: Option<f64>,
    /// Venue → share of truth volume, heaviest first.
    pub venue_mix: IndexMap<SmolStr, f64>,
    pub volavs: Vec<Volav>,
    pub bucket_size: f64,
    pub min_gap: f64,
    pub drift: Drift,
    pub state: MarketState,
    pub confidence: f64,
    pub insufficient_data: bool,
}

/// A timeframe window together with the metrics computed over it.
#[derive(Debug, Clone)]
pub struct WindowAnalysis<'a> {
    pub window: TimeframeWindow<'a>,
    pub weighted: Vec<WeightedPrint<'a>>,
    pub metrics: TimeframeMetrics,
}

impl WindowAnalysis<'_> {
    /// Truth ticks of the window in chronological order.
    pub fn truth_ticks(&self) -> impl Iterator<Item = &WeightedPrint<'_>> {
        self.weighted.iter().filter(|print| print.is_truth())
    }
}

/// Volume-weighted average price, `None` when the total volume is zero.
pub fn calculate_vwap(prints: &[WeightedPrint<'_>]) -> Option<f64> {
    let (sum_pv, sum_v) = prints.iter().fold((0.0, 0.0), |(sum_pv, sum_v), print| {
        let volume = print.weighted_volume();
        (sum_pv + print.price() * volume, sum_v + volume)
    });

    if sum_v > 0.0 { Some(sum_pv / sum_v) } else { None }
}

/// Share of weighted volume by venue, sorted descending (ties by venue name).
pub fn venue_mix(prints: &[WeightedPrint<'_>]) -> IndexMap<SmolStr, f64> {
    let mut volumes: IndexMap<SmolStr, f64> = IndexMap::new();
    for print in prints.iter().filter(|print| print.is_truth()) {
        let venue = print
            .print
            .venue
            .clone()
            .unwrap_or_else(|| SmolStr::new_static(UNKNOWN_VENUE));
        *volumes.entry(venue).or_default() += print.weighted_volume();
    }

    let total: f64 = volumes.values().sum();
    if total <= 0.0 {
        return IndexMap::new();
    }

    volumes
        .into_iter()
        .sorted_by(|(venue_a, a), (venue_b, b)| b.total_cmp(a).then_with(|| venue_a.cmp(venue_b)))
        .map(|(venue, volume)| (venue, volume / total))
        .collect()
}

/// Runs the truth tick pipeline over symbol snapshots.
#[derive(Clone, Copy)]
pub struct TruthTicksAnalyzer<'a> {
    config: &'a TruthTicksConfig,
    calendar: Option<&'a dyn TradingCalendar>,
}

impl std::fmt::Debug for TruthTicksAnalyzer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TruthTicksAnalyzer")
            .field("config", self.config)
            .field("trading_hours", &self.calendar.is_some())
            .finish()
    }
}

impl<'a> TruthTicksAnalyzer<'a> {
    pub fn new(config: &'a TruthTicksConfig) -> Self {
        Self {
            config,
            calendar: None,
        }
    }

    /// Use the trading-hours aware window variant.
    pub fn with_calendar(self, calendar: &'a dyn TradingCalendar) -> Self {
        Self {
            calendar: Some(calendar),
            ..self
        }
    }

    pub fn config(&self) -> &TruthTicksConfig {
        self.config
    }

    /// Metrics for every timeframe, shortest first.
    pub fn analyze(
        &self,
        prints: &[TradePrint],
        average_daily_volume: f64,
    ) -> Vec<TimeframeMetrics> {
        self.analyze_windows(prints, average_daily_volume)
            .into_iter()
            .map(|analysis| analysis.metrics)
            .collect()
    }

    /// Windows and metrics for every timeframe, shortest first.
    pub fn analyze_windows<'p>(
        &self,
        prints: &'p [TradePrint],
        average_daily_volume: f64,
    ) -> Vec<WindowAnalysis<'p>> {
        Timeframe::ALL
            .iter()
            .map(|timeframe| self.analyze_timeframe(prints, *timeframe, average_daily_volume))
            .collect()
    }

    /// Window and metrics for a single timeframe. An empty snapshot yields an empty window
    /// anchored at 0 flagged as insufficient data.
    pub fn analyze_timeframe<'p>(
        &self,
        prints: &'p [TradePrint],
        timeframe: Timeframe,
        average_daily_volume: f64,
    ) -> WindowAnalysis<'p> {
        let anchor = anchor_timestamp(prints).unwrap_or_default();
        let window = TimeframeWindow::select(prints, timeframe, anchor, self.calendar);
        let weighted =
            RealismFilter::new(&self.config.realism).apply(window.prints.iter().copied());
        let metrics = self.metrics(&window, &weighted, average_daily_volume);

        WindowAnalysis {
            window,
            weighted,
            metrics,
        }
    }

    fn metrics(
        &self,
        window: &TimeframeWindow<'_>,
        weighted: &[WeightedPrint<'_>],
        average_daily_volume: f64,
    ) -> TimeframeMetrics {
        let params = VolavParams::for_adv(self.config, average_daily_volume);
        let volavs = VolavBuilder::new(params).build(weighted);

        let truth_tick_count = weighted.iter().filter(|print| print.is_truth()).count();
        let truth_volume: f64 = weighted.iter().map(WeightedPrint::weighted_volume).sum();

        let drift = Drift::measure(weighted, params, average_daily_volume, &self.config.drift);
        let min_ticks = self.config.min_ticks_per_window;
        let inputs = DriftInputs::new(&drift, truth_tick_count, min_ticks);
        let classification = classify(&inputs, &self.config.drift);

        TimeframeMetrics {
            timeframe: window.timeframe,
            window_start: window.start,
            window_end: window.end,
            seen_count: window.len(),
            truth_tick_count,
            truth_volume,
            vwap: calculate_vwap(weighted),
            venue_mix: venue_mix(weighted),
            volavs,
            bucket_size: params.bucket_size,
            min_gap: params.min_gap,
            drift,
            state: classification.state,
            confidence: classification.confidence,
            insufficient_data: truth_tick_count < min_ticks,
        }
    }
}
