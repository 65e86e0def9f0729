//! Anchor-based timeframe windows over a symbol's tick history.
//!
//! "Now" is the timestamp of the latest print, never the wall clock, so weekends, holidays and
//! pre-market gaps do not empty the windows of a thinly-traded name.

use crate::{calendar::TradingCalendar, print::TradePrint};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Fixed analysis horizons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deserialize, Serialize,
)]
pub enum Timeframe {
    #[display("4H")]
    #[serde(rename = "4H")]
    FourHours,
    #[display("1D")]
    #[serde(rename = "1D")]
    OneDay,
    #[display("3D")]
    #[serde(rename = "3D")]
    ThreeDays,
    #[display("5D")]
    #[serde(rename = "5D")]
    FiveDays,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::FourHours,
        Timeframe::OneDay,
        Timeframe::ThreeDays,
        Timeframe::FiveDays,
    ];

    pub fn horizon_secs(&self) -> i64 {
        match self {
            Timeframe::FourHours => 4 * 3_600,
            Timeframe::OneDay => 86_400,
            Timeframe::ThreeDays => 3 * 86_400,
            Timeframe::FiveDays => 5 * 86_400,
        }
    }

    /// Trading sessions spanned by the horizon in the trading-hours aware variant.
    pub fn sessions(&self) -> usize {
        match self {
            Timeframe::FourHours | Timeframe::OneDay => 1,
            Timeframe::ThreeDays => 3,
            Timeframe::FiveDays => 5,
        }
    }
}

/// Prints of one timeframe, sorted chronologically (stable for equal timestamps).
#[derive(Debug, Clone)]
pub struct TimeframeWindow<'a> {
    pub timeframe: Timeframe,
    pub start: i64,
    pub end: i64,
    pub prints: Vec<&'a TradePrint>,
}

impl<'a> TimeframeWindow<'a> {
    /// Select the prints within `[anchor - horizon, anchor]`.
    ///
    /// With a calendar, the window start is additionally clipped so it never precedes the open of
    /// the earliest session the horizon covers. When the calendar cannot resolve a session the
    /// plain horizon is used.
    pub fn select(
        prints: &'a [TradePrint],
        timeframe: Timeframe,
        anchor: i64,
        calendar: Option<&dyn TradingCalendar>,
    ) -> Self {
        let horizon_start = anchor.saturating_sub(timeframe.horizon_secs());
        let start = calendar
            .and_then(|calendar| calendar.session_start(anchor, timeframe.sessions()))
            .map_or(horizon_start, |session_start| {
                horizon_start.max(session_start.min(anchor))
            });

        let mut window: Vec<&TradePrint> = prints
            .iter()
            .filter(|print| (start..=anchor).contains(&print.timestamp))
            .collect();
        window.sort_by_key(|print| print.timestamp);

        Self {
            timeframe,
            start,
            end: anchor,
            prints: window,
        }
    }

    pub fn len(&self) -> usize {
        self.prints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prints.is_empty()
    }

    /// Seconds between the first and last print in the window.
    pub fn span_secs(&self) -> i64 {
        match (self.prints.first(), self.prints.last()) {
            (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
            _ => 0,
        }
    }
}

/// Anchor timestamp: the latest print timestamp, `None` for an empty history.
pub fn anchor_timestamp(prints: &[TradePrint]) -> Option<i64> {
    prints.iter().map(|print| print.timestamp).max()
}
