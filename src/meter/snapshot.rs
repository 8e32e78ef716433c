//! Immutable cache contents and the summation rules over them.

use crate::core::{AppCounts, DailyUsage, Day, Period, RelayCounts, TodaysUsage};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Usage history and today's counts as loaded by one refresh cycle.
///
/// A snapshot is never modified after it is published; the refresh task
/// builds a fresh one and swaps it in.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    /// Finalized buckets inside the retention window
    pub daily: DailyUsage,
    /// Live counts for the current day
    pub today: TodaysUsage,
    /// When the load that produced this snapshot finished
    pub loaded_at: Option<DateTime<Utc>>,
    /// Sequence number of the load that produced this snapshot
    pub generation: u64,
}

impl CacheSnapshot {
    /// Relays for one application over the period.
    ///
    /// Historical buckets are read up to [`Period::historical_end`] and the
    /// live snapshot is added when the period includes today, so the current
    /// day is counted exactly once.
    pub fn app_count(&self, app: &str, period: &Period) -> RelayCounts {
        let mut count: RelayCounts = self
            .historical(period)
            .filter_map(|(_, apps)| apps.get(app))
            .sum();

        if period.includes_today {
            if let Some(today) = self.today.get(app) {
                count += *today;
            }
        }
        count
    }

    /// Relays summed over a set of applications.
    pub fn apps_count<'a, I>(&self, apps: I, period: &Period) -> RelayCounts
    where
        I: IntoIterator<Item = &'a str>,
    {
        apps.into_iter().map(|app| self.app_count(app, period)).sum()
    }

    /// Relays across every application in the snapshot.
    pub fn total_count(&self, period: &Period) -> RelayCounts {
        let mut count: RelayCounts = self
            .historical(period)
            .flat_map(|(_, apps)| apps.values())
            .sum();

        if period.includes_today {
            count += self.today.values().sum::<RelayCounts>();
        }
        count
    }

    /// Applications with any bucket inside the period, ordered by id.
    pub fn applications(&self, period: &Period) -> BTreeSet<&str> {
        let mut apps: BTreeSet<&str> = self
            .historical(period)
            .flat_map(|(_, apps)| apps.keys().map(String::as_str))
            .collect();

        if period.includes_today {
            apps.extend(self.today.keys().map(String::as_str));
        }
        apps
    }

    fn historical(&self, period: &Period) -> impl Iterator<Item = (&Day, &AppCounts)> + '_ {
        let from = period.from;
        let end = period.historical_end();
        let range = (from < end).then(|| self.daily.range(from..end));
        range.into_iter().flatten()
    }
}
