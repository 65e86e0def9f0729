//! Inclusion and exclusion reasoning.
//!
//! The evaluator runs the strict market-making checks in order, and only when one of them fails
//! falls back to the relaxed watchlist rules. Every verdict carries the reasons behind it.

use crate::config::MmConfig;
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a symbol was included, excluded or left without quotes.
#[derive(Debug, Clone, PartialEq, Display, Deserialize, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    #[display("no valid anchors")]
    NoValidAnchors,
    #[display("gap too narrow: {gap:.2} < {min:.2}")]
    GapTooNarrow { gap: f64, min: f64 },
    #[display("no edge after costs: gap {gap:.2} - commission {commission_buffer:.2} <= 0")]
    NoEdgeAfterCosts { gap: f64, commission_buffer: f64 },
    #[display("net edge {net_gap:.2} below minimum {min:.2}")]
    NetEdgeBelowMinimum { net_gap: f64, min: f64 },
    #[display("expected cycles {expected:.2} below target {target}")]
    CyclesBelowTarget { expected: f64, target: usize },
    #[display("mm value {mm_value:.3} below minimum {min:.3}")]
    ValueBelowMinimum { mm_value: f64, min: f64 },
    #[display(
        "strict checks passed: gap {:.2}, net edge {:.2}, {:.2} cycles, mm value {:.3}",
        gap,
        net_gap,
        expected_cycles,
        mm_value
    )]
    StrictChecksPassed {
        gap: f64,
        net_gap: f64,
        expected_cycles: f64,
        mm_value: f64,
    },
    #[display("{count} fast cycle(s) observed")]
    FastCycleObserved { count: usize },
    #[display("balanced anchors without cycles: balance {balance:.2}")]
    BalancedWithoutCycles { balance: f64 },
    #[display("wide untested gap {gap:.2}")]
    WideUntestedGap { gap: f64 },
    #[display("NO_L1_DATA: bid and ask required for live quotes")]
    NoL1Data,
    #[display("spread {spread} below minimum market spread {min}")]
    SpreadBelowMinimum { spread: Decimal, min: Decimal },
    #[display("quote gap {gap} below minimum order gap {min}")]
    QuoteGapBelowMinimum { gap: Decimal, min: Decimal },
}

/// Verdict classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictKind {
    #[display("TRADEABLE_MM")]
    TradeableMm,
    #[display("BIAS_MM")]
    BiasMm,
    #[display("EXCLUDED")]
    Excluded,
}

/// Tagged verdict with the reasons that produced it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub reasons: Vec<Reason>,
}

impl Verdict {
    pub fn is_tradeable(&self) -> bool {
        self.kind == VerdictKind::TradeableMm
    }
}

/// Everything the verdict rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerdictInputs {
    pub anchor_count: usize,
    pub gap: f64,
    pub net_gap: f64,
    pub expected_cycles: f64,
    pub target_cycles: usize,
    pub mm_value: f64,
    pub fast_cycles: usize,
    pub balance: f64,
}

type StrictCheck = fn(&VerdictInputs, &MmConfig) -> Option<Reason>;

/// Strict checks in order, each returning its failure.
const STRICT_CHECKS: &[StrictCheck] = &[check_gap, check_net_edge, check_cycles, check_value];

type BiasRule = fn(&VerdictInputs, &MmConfig) -> Option<Reason>;

/// Relaxed watchlist rules, any one of which qualifies a pair.
const BIAS_RULES: &[BiasRule] = &[fast_cycle, balanced_without_cycles, wide_untested_gap];

fn check_gap(inputs: &VerdictInputs, config: &MmConfig) -> Option<Reason> {
    if inputs.anchor_count == 0 {
        return Some(Reason::NoValidAnchors);
    }
    (inputs.gap < config.min_anchor_gap).then_some(Reason::GapTooNarrow {
        gap: inputs.gap,
        min: config.min_anchor_gap,
    })
}

fn check_net_edge(inputs: &VerdictInputs, config: &MmConfig) -> Option<Reason> {
    if inputs.net_gap <= 0.0 {
        Some(Reason::NoEdgeAfterCosts {
            gap: inputs.gap,
            commission_buffer: config.commission_buffer,
        })
    } else if inputs.net_gap < config.min_net_edge {
        Some(Reason::NetEdgeBelowMinimum {
            net_gap: inputs.net_gap,
            min: config.min_net_edge,
        })
    } else {
        None
    }
}

fn check_cycles(inputs: &VerdictInputs, _: &MmConfig) -> Option<Reason> {
    (inputs.expected_cycles < inputs.target_cycles as f64).then_some(Reason::CyclesBelowTarget {
        expected: inputs.expected_cycles,
        target: inputs.target_cycles,
    })
}

fn check_value(inputs: &VerdictInputs, config: &MmConfig) -> Option<Reason> {
    (inputs.mm_value < config.min_mm_value).then_some(Reason::ValueBelowMinimum {
        mm_value: inputs.mm_value,
        min: config.min_mm_value,
    })
}

fn fast_cycle(inputs: &VerdictInputs, _: &MmConfig) -> Option<Reason> {
    (inputs.fast_cycles >= 1).then_some(Reason::FastCycleObserved {
        count: inputs.fast_cycles,
    })
}

fn balanced_without_cycles(inputs: &VerdictInputs, config: &MmConfig) -> Option<Reason> {
    (inputs.fast_cycles == 0 && inputs.balance >= config.bias_min_balance).then_some(
        Reason::BalancedWithoutCycles {
            balance: inputs.balance,
        },
    )
}

fn wide_untested_gap(inputs: &VerdictInputs, config: &MmConfig) -> Option<Reason> {
    (inputs.fast_cycles == 0 && inputs.gap >= config.bias_min_gap)
        .then_some(Reason::WideUntestedGap { gap: inputs.gap })
}

/// Evaluate the verdict for a scored pair.
///
/// A missing anchor pair is excluded straight away. Otherwise every strict check is run so the
/// result lists all failures, and the watchlist rules only apply when at least one failed.
pub fn evaluate(inputs: &VerdictInputs, config: &MmConfig) -> Verdict {
    if inputs.anchor_count < 2 {
        let reason = check_gap(inputs, config).unwrap_or(Reason::NoValidAnchors);
        return Verdict {
            kind: VerdictKind::Excluded,
            reasons: vec![reason],
        };
    }

    let failures: Vec<Reason> = STRICT_CHECKS
        .iter()
        .filter_map(|check| check(inputs, config))
        .collect();

    if failures.is_empty() {
        return Verdict {
            kind: VerdictKind::TradeableMm,
            reasons: vec![Reason::StrictChecksPassed {
                gap: inputs.gap,
                net_gap: inputs.net_gap,
                expected_cycles: inputs.expected_cycles,
                mm_value: inputs.mm_value,
            }],
        };
    }

    let qualifiers: Vec<Reason> = BIAS_RULES
        .iter()
        .filter_map(|rule| rule(inputs, config))
        .collect();

    if qualifiers.is_empty() {
        Verdict {
            kind: VerdictKind::Excluded,
            reasons: failures,
        }
    } else {
        Verdict {
            kind: VerdictKind::BiasMm,
            reasons: qualifiers.into_iter().chain(failures).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing() -> VerdictInputs {
        VerdictInputs {
            anchor_count: 2,
            gap: 0.10,
            net_gap: 0.06,
            expected_cycles: 2.0,
            target_cycles: 2,
            mm_value: 0.12,
            fast_cycles: 2,
            balance: 1.0,
        }
    }

    /// Two lopsided anchors that never completed a cycle.
    fn untested() -> VerdictInputs {
        VerdictInputs {
            expected_cycles: 0.0,
            mm_value: 0.0,
            fast_cycles: 0,
            balance: 0.2,
            ..passing()
        }
    }

    #[test]
    fn test_evaluate() {
        struct TestCase {
            input: VerdictInputs,
            expected_kind: VerdictKind,
            expected_first: Reason,
        }

        let config = MmConfig::default();
        let tests = vec![
            // TC0: everything passes
            TestCase {
                input: passing(),
                expected_kind: VerdictKind::TradeableMm,
                expected_first: Reason::StrictChecksPassed {
                    gap: 0.10,
                    net_gap: 0.06,
                    expected_cycles: 2.0,
                    mm_value: 0.12,
                },
            },
            // TC1: too few cycles but fast cycles exist
            TestCase {
                input: VerdictInputs {
                    expected_cycles: 1.0,
                    fast_cycles: 1,
                    mm_value: 0.06,
                    ..passing()
                },
                expected_kind: VerdictKind::BiasMm,
                expected_first: Reason::FastCycleObserved { count: 1 },
            },
            // TC2: balanced pair without cycles
            TestCase {
                input: VerdictInputs {
                    gap: 0.08,
                    net_gap: 0.04,
                    balance: 0.7,
                    ..untested()
                },
                expected_kind: VerdictKind::BiasMm,
                expected_first: Reason::BalancedWithoutCycles { balance: 0.7 },
            },
            // TC3: wide gap, lopsided, never tested
            TestCase {
                input: VerdictInputs {
                    gap: 0.12,
                    net_gap: 0.08,
                    ..untested()
                },
                expected_kind: VerdictKind::BiasMm,
                expected_first: Reason::WideUntestedGap { gap: 0.12 },
            },
            // TC4: narrow lopsided pair without cycles
            TestCase {
                input: VerdictInputs {
                    gap: 0.07,
                    net_gap: 0.03,
                    ..untested()
                },
                expected_kind: VerdictKind::Excluded,
                expected_first: Reason::NetEdgeBelowMinimum { net_gap: 0.03, min: 0.04 },
            },
            // TC5: single level
            TestCase {
                input: VerdictInputs { anchor_count: 1, gap: 0.0, net_gap: 0.0, ..passing() },
                expected_kind: VerdictKind::Excluded,
                expected_first: Reason::GapTooNarrow { gap: 0.0, min: 0.06 },
            },
            // TC6: nothing at all
            TestCase {
                input: VerdictInputs { anchor_count: 0, gap: 0.0, net_gap: 0.0, ..passing() },
                expected_kind: VerdictKind::Excluded,
                expected_first: Reason::NoValidAnchors,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let verdict = evaluate(&test.input, &config);
            assert_eq!(verdict.kind, test.expected_kind, "TC{} failed", index);
            assert_eq!(verdict.reasons[0], test.expected_first, "TC{} failed", index);
        }
    }

    #[test]
    fn test_all_strict_failures_are_reported() {
        let inputs = VerdictInputs {
            gap: 0.05,
            net_gap: 0.01,
            expected_cycles: 0.0,
            mm_value: 0.0,
            fast_cycles: 0,
            balance: 0.1,
            ..passing()
        };
        let verdict = evaluate(&inputs, &MmConfig::default());

        assert_eq!(verdict.kind, VerdictKind::Excluded);
        assert_eq!(verdict.reasons.len(), 4);
        assert!(matches!(verdict.reasons[0], Reason::GapTooNarrow { .. }));
        assert!(matches!(verdict.reasons[1], Reason::NetEdgeBelowMinimum { .. }));
        assert!(matches!(verdict.reasons[2], Reason::CyclesBelowTarget { .. }));
        assert!(matches!(verdict.reasons[3], Reason::ValueBelowMinimum { .. }));
    }

    #[test]
    fn test_reason_display_and_serde() {
        let reason = Reason::GapTooNarrow { gap: 0.0, min: 0.06 };
        assert_eq!(reason.to_string(), "gap too narrow: 0.00 < 0.06");
        assert!(reason.to_string().starts_with("gap too narrow"));

        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["code"], "GAP_TOO_NARROW");
        assert_eq!(serde_json::to_value(VerdictKind::BiasMm).unwrap(), "BIAS_MM");
        assert_eq!(VerdictKind::TradeableMm.to_string(), "TRADEABLE_MM");
    }
}
