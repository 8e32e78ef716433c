//! Domain types shared by the meter, the collector and the stores.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// A calendar date in UTC, the unit of aggregation.
pub type Day = NaiveDate;

/// Public key identifying an application.
pub type ApplicationId = String;

/// Counts for a single day, keyed by application.
pub type AppCounts = BTreeMap<ApplicationId, RelayCounts>;

/// Finalized per-day counts.
pub type DailyUsage = BTreeMap<Day, AppCounts>;

/// Live counts for the current, not yet finalized day.
pub type TodaysUsage = AppCounts;

/// Successful and failed relay counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelayCounts {
    /// Relays that were served successfully
    pub success: u64,
    /// Relays that failed
    pub failure: u64,
}

impl RelayCounts {
    /// Creates a new count pair
    pub const fn new(success: u64, failure: u64) -> Self {
        Self { success, failure }
    }

    /// Total relays, successful or not
    pub fn total(&self) -> u64 {
        self.success.saturating_add(self.failure)
    }

    /// Returns true if nothing was counted
    pub fn is_zero(&self) -> bool {
        self.success == 0 && self.failure == 0
    }
}

impl Add for RelayCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            success: self.success.saturating_add(rhs.success),
            failure: self.failure.saturating_add(rhs.failure),
        }
    }
}

impl AddAssign for RelayCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for RelayCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a RelayCounts> for RelayCounts {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// A load balancer endpoint and the applications behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    /// Endpoint identifier
    pub id: String,
    /// Member applications, in the order the repository lists them
    pub applications: Vec<ApplicationId>,
}

impl LoadBalancer {
    /// Creates a load balancer from its id and member applications
    pub fn new<I, S>(id: impl Into<String>, applications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ApplicationId>,
    {
        Self {
            id: id.into(),
            applications: applications.into_iter().map(Into::into).collect(),
        }
    }
}

/// The UTC day a timestamp falls on.
pub fn day_of(time: DateTime<Utc>) -> Day {
    time.date_naive()
}

/// UTC midnight at the start of `day`.
pub fn start_of(day: Day) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

/// `day` shifted by a (possibly negative) number of days.
pub fn add_days(day: Day, days: i64) -> Day {
    day + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_counts_addition() {
        let mut counts = RelayCounts::new(2, 3);
        counts += RelayCounts::new(50, 40);
        assert_eq!(counts, RelayCounts::new(52, 43));
        assert_eq!(counts.total(), 95);
    }

    #[test]
    fn test_relay_counts_zero_is_identity() {
        let counts = RelayCounts::new(7, 1);
        assert_eq!(counts + RelayCounts::default(), counts);
        assert!(RelayCounts::default().is_zero());
    }

    #[test]
    fn test_relay_counts_sum() {
        let all = [RelayCounts::new(1, 5), RelayCounts::new(2, 3), RelayCounts::new(5, 7)];
        let total: RelayCounts = all.iter().sum();
        assert_eq!(total, RelayCounts::new(8, 15));
    }

    #[test]
    fn test_day_helpers() {
        let noon = Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap();
        let day = day_of(noon);
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(start_of(day), Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
        assert_eq!(add_days(day, 1), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(add_days(day, -29), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn test_load_balancer_preserves_member_order() {
        let lb = LoadBalancer::new("lb1", ["app3", "app1", "app2"]);
        assert_eq!(lb.applications, vec!["app3", "app1", "app2"]);
    }
}
