//! In-memory usage store.
//!
//! Keeps day buckets, today's snapshot and the user/load balancer directory
//! behind a single lock. Suitable for local runs and tests; nothing survives
//! a restart.

use super::{UsageBackend, UsageWriter};
use crate::core::config::SimulationConfig;
use crate::core::types::add_days;
use crate::core::{DailyUsage, Day, LoadBalancer, Result, TodaysUsage};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct StoreState {
    daily: DailyUsage,
    today: TodaysUsage,
    users: BTreeMap<String, Vec<String>>,
    load_balancers: Vec<LoadBalancer>,
}

/// Usage store held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryUsageStore {
    state: RwLock<StoreState>,
}

impl InMemoryUsageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose directory mirrors the simulation settings.
    pub fn from_simulation(simulation: &SimulationConfig) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write();
            state.users = simulation.users.clone();
            state.load_balancers = simulation.load_balancers.clone();
        }
        store
    }

    /// Register the applications owned by a user.
    pub fn with_user<I, S>(self, user: &str, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .write()
            .users
            .insert(user.to_string(), apps.into_iter().map(Into::into).collect());
        self
    }

    /// Register a load balancer, replacing one with the same id.
    pub fn with_load_balancer(self, load_balancer: LoadBalancer) -> Self {
        {
            let mut state = self.state.write();
            state.load_balancers.retain(|lb| lb.id != load_balancer.id);
            state.load_balancers.push(load_balancer);
        }
        self
    }

    /// Number of persisted day buckets.
    pub fn persisted_days(&self) -> usize {
        self.state.read().daily.len()
    }
}

#[async_trait::async_trait]
impl UsageBackend for InMemoryUsageStore {
    async fn daily_usage(&self, from: Day, to: Day) -> Result<DailyUsage> {
        if from >= to {
            return Ok(DailyUsage::new());
        }
        let state = self.state.read();
        Ok(state
            .daily
            .range(from..to)
            .map(|(day, counts)| (*day, counts.clone()))
            .collect())
    }

    async fn todays_usage(&self) -> Result<TodaysUsage> {
        Ok(self.state.read().today.clone())
    }

    async fn user_apps(&self, user: &str) -> Result<Vec<String>> {
        Ok(self.state.read().users.get(user).cloned().unwrap_or_default())
    }

    async fn load_balancer(&self, endpoint: &str) -> Result<Option<LoadBalancer>> {
        Ok(self
            .state
            .read()
            .load_balancers
            .iter()
            .find(|lb| lb.id == endpoint)
            .cloned())
    }

    async fn load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        Ok(self.state.read().load_balancers.clone())
    }
}

#[async_trait::async_trait]
impl UsageWriter for InMemoryUsageStore {
    async fn persisted_span(&self) -> Result<Option<(Day, Day)>> {
        let state = self.state.read();
        let Some(&last) = state.daily.keys().next_back() else {
            return Ok(None);
        };

        // Only the run ending at the newest bucket counts as persisted, so an
        // older island never hides a gap from the collector.
        let mut first = last;
        while state.daily.contains_key(&add_days(first, -1)) {
            first = add_days(first, -1);
        }
        Ok(Some((first, last)))
    }

    async fn write_daily_usage(&self, usage: &DailyUsage) -> Result<()> {
        let mut state = self.state.write();
        for (day, counts) in usage {
            state.daily.insert(*day, counts.clone());
        }
        Ok(())
    }

    async fn write_todays_usage(&self, usage: &TodaysUsage) -> Result<()> {
        self.state.write().today = usage.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AppCounts, RelayCounts};
    use chrono::NaiveDate;

    fn day(d: u32) -> Day {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn bucket(success: u64, failure: u64) -> AppCounts {
        let mut counts = AppCounts::new();
        counts.insert("app1".to_string(), RelayCounts::new(success, failure));
        counts
    }

    #[tokio::test]
    async fn test_empty_store_has_no_span() {
        let store = InMemoryUsageStore::new();
        assert_eq!(store.persisted_span().await.unwrap(), None);
        assert!(store.todays_usage().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_daily_usage_range_is_half_open() {
        let store = InMemoryUsageStore::new();
        let usage: DailyUsage = (1..=5).map(|d| (day(d), bucket(u64::from(d), 0))).collect();
        store.write_daily_usage(&usage).await.unwrap();

        let read = store.daily_usage(day(2), day(4)).await.unwrap();
        assert_eq!(read.keys().copied().collect::<Vec<_>>(), vec![day(2), day(3)]);
        assert!(store.daily_usage(day(4), day(4)).await.unwrap().is_empty());
        assert_eq!(store.persisted_days(), 5);
    }

    #[tokio::test]
    async fn test_persisted_span_follows_latest_contiguous_run() {
        let store = InMemoryUsageStore::new();
        let usage: DailyUsage = [1, 2, 5, 6, 7]
            .into_iter()
            .map(|d| (day(d), bucket(1, 1)))
            .collect();
        store.write_daily_usage(&usage).await.unwrap();

        assert_eq!(store.persisted_span().await.unwrap(), Some((day(5), day(7))));
    }

    #[tokio::test]
    async fn test_writes_replace_buckets_and_today() {
        let store = InMemoryUsageStore::new();
        let mut usage = DailyUsage::new();
        usage.insert(day(3), bucket(1, 1));
        store.write_daily_usage(&usage).await.unwrap();
        usage.insert(day(3), bucket(9, 9));
        store.write_daily_usage(&usage).await.unwrap();

        let read = store.daily_usage(day(1), day(10)).await.unwrap();
        assert_eq!(read[&day(3)]["app1"], RelayCounts::new(9, 9));

        store.write_todays_usage(&bucket(4, 2)).await.unwrap();
        store.write_todays_usage(&bucket(5, 1)).await.unwrap();
        assert_eq!(store.todays_usage().await.unwrap()["app1"], RelayCounts::new(5, 1));
    }

    #[tokio::test]
    async fn test_directory_lookups() {
        let store = InMemoryUsageStore::new()
            .with_user("user1", ["app1", "app2"])
            .with_load_balancer(LoadBalancer::new("lb1", ["app1"]))
            .with_load_balancer(LoadBalancer::new("lb1", ["app1", "app2"]));

        assert_eq!(store.user_apps("user1").await.unwrap(), vec!["app1", "app2"]);
        assert!(store.user_apps("nobody").await.unwrap().is_empty());

        let lb = store.load_balancer("lb1").await.unwrap().unwrap();
        assert_eq!(lb.applications, vec!["app1", "app2"]);
        assert!(store.load_balancer("missing").await.unwrap().is_none());
        assert_eq!(store.load_balancers().await.unwrap().len(), 1);
    }
}
