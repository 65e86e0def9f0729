//! Quote generation.
//!
//! Live quotes step inside the touch by a fraction of the spread. The fraction starts at the base
//! and rises one step for every benchmark shock threshold the benchmark's recent move crosses,
//! capped at the maximum. Closed markets get resting zones at the anchors instead.

use crate::{config::QuoteConfig, pingpong::AnchorPair, verdict::Reason};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::{Deserialize, Serialize};

/// Cents.
const QUOTE_DP: u32 = 2;

/// Live top of book supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BookSnapshot {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    /// Derived from bid and ask when absent.
    pub spread: Option<Decimal>,
}

impl BookSnapshot {
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self {
            bid: Some(bid),
            ask: Some(ask),
            spread: None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        self.spread.or_else(|| Some(self.ask? - self.bid?))
    }
}

/// Benchmark tracking fields. Changes are in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BenchmarkInputs {
    pub change_now: Option<f64>,
    pub change_5m: Option<f64>,
    pub prior_close: Option<f64>,
    pub last_observed_price: Option<f64>,
}

impl BenchmarkInputs {
    /// Change since the prior close, derived from the last observed price when not supplied.
    pub fn change_now(&self) -> Option<f64> {
        self.change_now.or_else(|| {
            let prior = self.prior_close.filter(|prior| *prior > 0.0)?;
            let last = self.last_observed_price?;
            Some((last - prior) / prior * 100.0)
        })
    }

    /// Largest absolute change across the tracked horizons.
    pub fn shock_magnitude(&self) -> f64 {
        [self.change_now(), self.change_5m]
            .into_iter()
            .flatten()
            .filter(|change| change.is_finite())
            .map(f64::abs)
            .fold(0.0, f64::max)
    }
}

/// Buy and sell quotes for a live market.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LiveQuotes {
    pub buy: Decimal,
    pub sell: Decimal,
    pub spread: Decimal,
    /// Share of the spread captured on each side.
    pub fraction: Decimal,
    pub shock_steps: usize,
}

/// What the result offers to trade.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuotePlan {
    Live(LiveQuotes),
    /// Resting zones for a closed market: buy at anchor A, sell at anchor B.
    Zones { buy_zone: Decimal, sell_zone: Decimal },
    Unavailable { reason: Reason },
}

impl QuotePlan {
    /// Zones at the anchors, rounded to cents.
    pub fn zones(pair: &AnchorPair) -> Self {
        Self::Zones {
            buy_zone: to_price(pair.anchor_a),
            sell_zone: to_price(pair.anchor_b),
        }
    }

    pub fn live(&self) -> Option<&LiveQuotes> {
        match self {
            Self::Live(quotes) => Some(quotes),
            _ => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&Reason> {
        match self {
            Self::Unavailable { reason } => Some(reason),
            _ => None,
        }
    }
}

fn to_price(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp(QUOTE_DP)
}

/// Generates live quotes from the book and benchmark state.
#[derive(Debug, Clone, Copy)]
pub struct QuoteGenerator<'a> {
    config: &'a QuoteConfig,
}

impl<'a> QuoteGenerator<'a> {
    pub fn new(config: &'a QuoteConfig) -> Self {
        Self { config }
    }

    /// Number of shock thresholds crossed by the benchmark.
    pub fn shock_steps(&self, benchmark: Option<&BenchmarkInputs>) -> usize {
        let magnitude = benchmark.map_or(0.0, BenchmarkInputs::shock_magnitude);
        self.config
            .shock_thresholds
            .iter()
            .filter(|threshold| magnitude >= **threshold)
            .count()
    }

    /// Spread capture fraction for `shock_steps` crossed thresholds.
    pub fn fraction(&self, shock_steps: usize) -> Decimal {
        // No order history is tracked yet, so front-run steps never reduce the fraction
        let front_run_steps = Decimal::ZERO;
        let fraction = self.config.base_fraction
            + self.config.step_fraction * (Decimal::from(shock_steps) - front_run_steps);
        fraction.clamp(Decimal::ZERO, self.config.max_fraction)
    }

    /// Live quotes, or the reason none can be produced.
    pub fn quote(
        &self,
        book: Option<&BookSnapshot>,
        benchmark: Option<&BenchmarkInputs>,
    ) -> Result<LiveQuotes, Reason> {
        let Some((bid, ask, spread)) =
            book.and_then(|book| Some((book.bid?, book.ask?, book.spread()?)))
        else {
            return Err(Reason::NoL1Data);
        };

        if spread < self.config.min_market_spread {
            return Err(Reason::SpreadBelowMinimum {
                spread,
                min: self.config.min_market_spread,
            });
        }

        let shock_steps = self.shock_steps(benchmark);
        let fraction = self.fraction(shock_steps);
        let buy = (bid + spread * fraction).round_dp(QUOTE_DP);
        let sell = (ask - spread * fraction).round_dp(QUOTE_DP);

        let gap = sell - buy;
        if gap < self.config.min_order_gap {
            return Err(Reason::QuoteGapBelowMinimum {
                gap,
                min: self.config.min_order_gap,
            });
        }

        Ok(LiveQuotes {
            buy,
            sell,
            spread,
            fraction,
            shock_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_base_fraction() {
        let config = QuoteConfig::default();
        let book = BookSnapshot::new(dec!(10.00), dec!(10.20));

        let quotes = QuoteGenerator::new(&config).quote(Some(&book), None).unwrap();
        assert_eq!(quotes.spread, dec!(0.20));
        assert_eq!(quotes.fraction, dec!(0.15));
        assert_eq!(quotes.buy, dec!(10.03));
        assert_eq!(quotes.sell, dec!(10.17));
        assert_eq!(quotes.shock_steps, 0);
    }

    #[test]
    fn test_quote_rejections() {
        struct TestCase {
            book: Option<BookSnapshot>,
            expected: Reason,
        }

        let tests = vec![
            // TC0: no book
            TestCase {
                book: None,
                expected: Reason::NoL1Data,
            },
            // TC1: missing ask
            TestCase {
                book: Some(BookSnapshot {
                    bid: Some(dec!(10.00)),
                    ask: None,
                    spread: Some(dec!(0.10)),
                }),
                expected: Reason::NoL1Data,
            },
            // TC2: spread below the market minimum
            TestCase {
                book: Some(BookSnapshot::new(dec!(10.00), dec!(10.04))),
                expected: Reason::SpreadBelowMinimum { spread: dec!(0.04), min: dec!(0.06) },
            },
            // TC3: explicit spread wins over the derived one
            TestCase {
                book: Some(BookSnapshot {
                    bid: Some(dec!(10.00)),
                    ask: Some(dec!(10.20)),
                    spread: Some(dec!(0.05)),
                }),
                expected: Reason::SpreadBelowMinimum { spread: dec!(0.05), min: dec!(0.06) },
            },
            // TC4: capped fraction leaves quotes inside a 0.06 spread only 0.02 apart
            TestCase {
                book: Some(BookSnapshot::new(dec!(10.00), dec!(10.06))),
                expected: Reason::QuoteGapBelowMinimum { gap: dec!(0.02), min: dec!(0.04) },
            },
        ];

        let config = QuoteConfig::default();
        let generator = QuoteGenerator::new(&config);
        let shock = BenchmarkInputs {
            change_now: Some(-2.0),
            ..BenchmarkInputs::default()
        };

        for (index, test) in tests.into_iter().enumerate() {
            let actual = generator.quote(test.book.as_ref(), Some(&shock)).unwrap_err();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_shock_steps_and_fraction() {
        struct TestCase {
            input: BenchmarkInputs,
            expected_steps: usize,
            expected_fraction: Decimal,
        }

        let tests = vec![
            // TC0: calm benchmark
            TestCase {
                input: BenchmarkInputs {
                    change_now: Some(0.1),
                    change_5m: Some(-0.2),
                    ..Default::default()
                },
                expected_steps: 0,
                expected_fraction: dec!(0.15),
            },
            // TC1: 5 minute move dominates
            TestCase {
                input: BenchmarkInputs {
                    change_now: Some(0.1),
                    change_5m: Some(-0.6),
                    ..Default::default()
                },
                expected_steps: 2,
                expected_fraction: dec!(0.21),
            },
            // TC2: change derived from prior close, -0.8%
            TestCase {
                input: BenchmarkInputs {
                    prior_close: Some(500.0),
                    last_observed_price: Some(496.0),
                    ..Default::default()
                },
                expected_steps: 3,
                expected_fraction: dec!(0.24),
            },
            // TC3: every threshold crossed hits the cap
            TestCase {
                input: BenchmarkInputs { change_now: Some(3.0), ..Default::default() },
                expected_steps: 5,
                expected_fraction: dec!(0.30),
            },
        ];

        let config = QuoteConfig::default();
        let generator = QuoteGenerator::new(&config);

        for (index, test) in tests.into_iter().enumerate() {
            let steps = generator.shock_steps(Some(&test.input));
            assert_eq!(steps, test.expected_steps, "TC{} failed", index);
            assert_eq!(generator.fraction(steps), test.expected_fraction, "TC{} failed", index);
        }
    }

    #[test]
    fn test_fraction_capped() {
        let config = QuoteConfig::default();
        assert_eq!(QuoteGenerator::new(&config).fraction(50), dec!(0.30));
    }

    #[test]
    fn test_closed_market_zones() {
        let pair = AnchorPair {
            anchor_a: 24.8999999,
            anchor_b: 25.05,
            volume_a: 100.0,
            volume_b: 100.0,
        };
        assert_eq!(
            QuotePlan::zones(&pair),
            QuotePlan::Zones { buy_zone: dec!(24.90), sell_zone: dec!(25.05) }
        );
    }
}
