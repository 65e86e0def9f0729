//! Trade print types.
//!
//! A [`RawPrint`] is whatever the feed adapter hands over; a [`TradePrint`] is a validated,
//! immutable print as held by the [`TickStore`](crate::store::TickStore).

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Trade print as delivered by an external feed, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawPrint {
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub price: f64,
    pub size: f64,
    #[serde(default)]
    pub venue: Option<String>,
}

/// Validated trade print.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradePrint {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub price: f64,
    pub size: f64,
    /// Reporting venue, `None` when the feed could not attribute the print.
    pub venue: Option<SmolStr>,
}

impl TradePrint {
    pub fn new(timestamp: i64, price: f64, size: f64, venue: Option<&str>) -> Self {
        Self {
            timestamp,
            price,
            size,
            venue: venue.map(SmolStr::new),
        }
    }

    /// Validate a raw feed print, returning `None` for anything malformed.
    ///
    /// Price and size must be finite and strictly positive and a timestamp must be present.
    /// Blank venue identifiers are normalised to `None`.
    pub fn from_raw(raw: RawPrint) -> Option<Self> {
        let timestamp = raw.timestamp?;
        if !(raw.price.is_finite() && raw.price > 0.0) {
            return None;
        }
        if !(raw.size.is_finite() && raw.size > 0.0) {
            return None;
        }

        let venue = raw
            .venue
            .as_deref()
            .map(str::trim)
            .filter(|venue| !venue.is_empty())
            .map(SmolStr::new);

        Some(Self {
            timestamp,
            price: raw.price,
            size: raw.size,
            venue,
        })
    }
}

impl From<TradePrint> for RawPrint {
    fn from(value: TradePrint) -> Self {
        Self {
            timestamp: Some(value.timestamp),
            price: value.price,
            size: value.size,
            venue: value.venue.map(|venue| venue.to_string()),
        }
    }
}

/// A [`TradePrint`] annotated with its realism weight. Recomputed on every analysis pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPrint<'a> {
    pub print: &'a TradePrint,
    /// Realism weight in `[0, 1]`.
    pub weight: f64,
}

impl<'a> WeightedPrint<'a> {
    pub fn price(&self) -> f64 {
        self.print.price
    }

    pub fn timestamp(&self) -> i64 {
        self.print.timestamp
    }

    /// Size scaled by realism weight.
    pub fn weighted_volume(&self) -> f64 {
        self.print.size * self.weight
    }

    /// Whether this print counts as a truth tick.
    pub fn is_truth(&self) -> bool {
        self.weight > 0.0
    }
}
