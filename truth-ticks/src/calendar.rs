//! Trading calendar used to clip timeframe windows to real trading sessions.
//!
//! The engine never decides what a trading day is on its own. It consumes a [`TradingCalendar`],
//! normally resolved by the caller from exchange reference data. [`SessionCalendar`] covers the
//! common case of a single fixed-offset venue with one regular session per weekday.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound on days walked back when searching for trading sessions.
const MAX_LOOKBACK_DAYS: usize = 400;

/// Source of trading session boundaries.
pub trait TradingCalendar: Send + Sync {
    /// Open timestamp of the `sessions`-th trading session counting back from the session that
    /// contains, or most recently precedes, `anchor`. `sessions = 1` is that session itself.
    ///
    /// Returns `None` when no such session can be resolved.
    fn session_start(&self, anchor: i64, sessions: usize) -> Option<i64>;

    /// Whether the regular session is open at `timestamp`.
    fn is_open(&self, timestamp: i64) -> bool;
}

/// Fixed-offset, single-session exchange calendar with weekend and holiday exclusion.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionCalendar {
    /// Exchange offset from UTC in seconds, e.g. -18000 for US Eastern standard time.
    pub utc_offset_secs: i32,
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub holidays: BTreeSet<NaiveDate>,
}

impl Default for SessionCalendar {
    fn default() -> Self {
        Self {
            utc_offset_secs: -5 * 3600,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            holidays: BTreeSet::new(),
        }
    }
}

impl SessionCalendar {
    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_secs)
    }

    fn local(&self, timestamp: i64) -> Option<DateTime<FixedOffset>> {
        let offset = self.offset()?;
        DateTime::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(&offset))
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// Open and close timestamps of the regular session on `date`, if it is a trading day.
    pub fn session_bounds(&self, date: NaiveDate) -> Option<(i64, i64)> {
        if !self.is_trading_day(date) {
            return None;
        }
        let offset = self.offset()?;
        let open = offset.from_local_datetime(&date.and_time(self.open)).single()?;
        let close = offset.from_local_datetime(&date.and_time(self.close)).single()?;
        Some((open.timestamp(), close.timestamp()))
    }

    fn previous_trading_day(&self, mut date: NaiveDate) -> Option<NaiveDate> {
        for _ in 0..MAX_LOOKBACK_DAYS {
            date = date.pred_opt()?;
            if self.is_trading_day(date) {
                return Some(date);
            }
        }
        None
    }

    /// Trading day of the session containing `timestamp`, or the last one before it.
    /// Pre-market timestamps belong to the previous session.
    fn session_date(&self, timestamp: i64) -> Option<NaiveDate> {
        let local = self.local(timestamp)?;
        let date = local.date_naive();
        if self.is_trading_day(date) && local.time() >= self.open {
            Some(date)
        } else {
            self.previous_trading_day(date)
        }
    }
}

impl TradingCalendar for SessionCalendar {
    fn session_start(&self, anchor: i64, sessions: usize) -> Option<i64> {
        let mut date = self.session_date(anchor)?;
        for _ in 1..sessions.max(1) {
            date = self.previous_trading_day(date)?;
        }
        self.session_bounds(date).map(|(open, _)| open)
    }

    fn is_open(&self, timestamp: i64) -> bool {
        let Some(local) = self.local(timestamp) else {
            return false;
        };
        self.session_bounds(local.date_naive())
            .is_some_and(|(open, close)| (open..close).contains(&timestamp))
    }
}
