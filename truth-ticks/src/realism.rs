//! Print realism weighting.
//!
//! Odd-lot and internally-crossed prints are known to be unrepresentative for illiquid names, so
//! each print gets a weight in `[0, 1]` that scales its size wherever volume is aggregated. This
//! is a policy, not a hard filter: only prints below the absolute minimum size get weight 0.

use crate::{
    config::RealismConfig,
    print::{TradePrint, WeightedPrint},
};

/// Computes realism weights for trade prints.
#[derive(Debug, Clone, Copy)]
pub struct RealismFilter<'a> {
    config: &'a RealismConfig,
}

impl<'a> RealismFilter<'a> {
    pub fn new(config: &'a RealismConfig) -> Self {
        Self { config }
    }

    /// Realism weight of a single print, always within `[0, 1]`.
    pub fn weight(&self, print: &TradePrint) -> f64 {
        let size = print.size;
        if size < self.config.min_size {
            return 0.0;
        }

        let internal_or_unknown = match print.venue.as_deref() {
            None => true,
            Some(venue) => venue.eq_ignore_ascii_case(&self.config.internal_venue),
        };
        if !internal_or_unknown {
            return 1.0;
        }

        if self.config.round_lots.iter().any(|lot| *lot == size) {
            1.0
        } else if size >= self.config.large_round_lot_min && self.is_round_multiple(size) {
            self.config.large_round_lot_weight
        } else {
            self.config.odd_size_weight
        }
    }

    fn is_round_multiple(&self, size: f64) -> bool {
        let lots = size / self.config.round_lot_unit;
        (lots - lots.round()).abs() < 1e-9
    }

    /// Annotate every print with its weight, preserving order. Zero-weight prints are kept so
    /// they still count as seen.
    pub fn apply<'p>(
        &self,
        prints: impl IntoIterator<Item = &'p TradePrint>,
    ) -> Vec<WeightedPrint<'p>> {
        prints
            .into_iter()
            .map(|print| WeightedPrint {
                print,
                weight: self.weight(print),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_policy() {
        struct TestCase {
            size: f64,
            venue: Option<&'static str>,
            expected: f64,
        }

        let config = RealismConfig::default();
        let filter = RealismFilter::new(&config);

        let tests = vec![
            // TC0: below minimum size on a real venue
            TestCase {
                size: 19.0,
                venue: Some("NYSE"),
                expected: 0.0,
            },
            // TC1: below minimum size on unknown venue
            TestCase {
                size: 5.0,
                venue: None,
                expected: 0.0,
            },
            // TC2: known venue odd lot is real
            TestCase {
                size: 37.0,
                venue: Some("ARCA"),
                expected: 1.0,
            },
            // TC3: internal venue canonical round lot
            TestCase {
                size: 100.0,
                venue: Some("FNRA"),
                expected: 1.0,
            },
            // TC4: unknown venue canonical round lot
            TestCase {
                size: 200.0,
                venue: None,
                expected: 1.0,
            },
            // TC5: internal venue large round multiple
            TestCase {
                size: 500.0,
                venue: Some("fnra"),
                expected: 0.4,
            },
            // TC6: unknown venue large round multiple at the boundary
            TestCase {
                size: 300.0,
                venue: None,
                expected: 0.4,
            },
            // TC7: unknown venue odd size
            TestCase {
                size: 50.0,
                venue: None,
                expected: 0.2,
            },
            // TC8: internal venue non-round large size
            TestCase {
                size: 350.0,
                venue: Some("FNRA"),
                expected: 0.2,
            },
            // TC9: exactly the minimum size
            TestCase {
                size: 20.0,
                venue: None,
                expected: 0.2,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let print = TradePrint::new(1, 25.0, test.size, test.venue);
            assert_eq!(filter.weight(&print), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_weight_bounds_and_zero_volume_below_minimum() {
        let config = RealismConfig::default();
        let filter = RealismFilter::new(&config);

        let prints: Vec<TradePrint> = (1..=1_000)
            .map(|size| {
                let venue = match size % 3 {
                    0 => None,
                    1 => Some("FNRA"),
                    _ => Some("NSDQ"),
                };
                TradePrint::new(size as i64, 10.0, size as f64, venue)
            })
            .collect();

        for weighted in filter.apply(&prints) {
            assert!((0.0..=1.0).contains(&weighted.weight));
            if weighted.print.size < 20.0 {
                assert_eq!(weighted.weighted_volume(), 0.0);
                assert!(!weighted.is_truth());
            }
        }
    }
}
