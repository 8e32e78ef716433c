//! Day-aligned query windows.
//!
//! Every range handed to the meter or the collector goes through
//! [`normalize`], which fills in missing bounds, truncates to UTC days and
//! decides whether the live "today" counts belong in the window.

use crate::core::types::{add_days, day_of, start_of, Day};
use crate::core::{MeterError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lookback used when a caller omits `from` and no horizon is configured.
pub const DEFAULT_MAX_PAST_DAYS: u32 = 30;

/// Longest lookback or backfill horizon a configuration may ask for.
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// A validated `[from, to)` window of whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    /// First day in the window
    pub from: Day,
    /// Exclusive upper bound
    pub to: Day,
    /// Whether the window covers the current, still open day
    pub includes_today: bool,
}

impl Period {
    /// Exclusive bound of the finalized part of the window.
    ///
    /// When today is included its counts come from the live snapshot, so
    /// historical buckets stop one day short of `to`.
    pub fn historical_end(&self) -> Day {
        if self.includes_today {
            add_days(self.to, -1)
        } else {
            self.to
        }
    }

    /// Number of days covered, today included
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days()
    }

    /// Returns true if `day` falls in the finalized part of the window
    pub fn contains_historical(&self, day: Day) -> bool {
        day >= self.from && day < self.historical_end()
    }

    /// Midnight (UTC) at the start of the window
    pub fn from_datetime(&self) -> DateTime<Utc> {
        start_of(self.from)
    }

    /// Midnight (UTC) at the exclusive end of the window
    pub fn to_datetime(&self) -> DateTime<Utc> {
        start_of(self.to)
    }
}

/// Converts a caller-supplied range into a day-aligned [`Period`].
///
/// Unset `from` defaults to `max_past_days` before `now` (zero selects
/// [`DEFAULT_MAX_PAST_DAYS`]), unset `to` defaults to `now`. A window that
/// reaches today is capped at `today + 1`, since nothing exists past today.
///
/// Fails with [`MeterError::InvalidTimeRange`] carrying the bounds as given
/// when `from` falls on a later day than `to`, or after today.
/// Fails with [`MeterError::Config`] when the default lookback reaches past
/// the representable calendar.
pub fn normalize(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_past_days: u32,
) -> Result<Period> {
    let max_past_days = if max_past_days == 0 {
        DEFAULT_MAX_PAST_DAYS
    } else {
        max_past_days
    };

    let from = match from {
        Some(from) => from,
        None => now
            .checked_sub_signed(Duration::days(i64::from(max_past_days)))
            .ok_or_else(|| {
                MeterError::config(format!("max_past_days out of range: {}", max_past_days))
            })?,
    };
    let to = to.unwrap_or(now);

    let from_day = day_of(from);
    let to_day = day_of(to);
    let today = day_of(now);

    if from_day > to_day || from_day > today {
        return Err(MeterError::InvalidTimeRange { from, to });
    }

    let includes_today = to_day >= today;
    let end = if includes_today {
        add_days(today, 1)
    } else {
        add_days(to_day, 1)
    };

    Ok(Period {
        from: from_day,
        to: end,
        includes_today,
    })
}

/// Whole days in a configured duration, rounding down.
pub fn whole_days(duration: std::time::Duration) -> u32 {
    u32::try_from(duration.as_secs() / SECONDS_PER_DAY).unwrap_or(u32::MAX)
}
