//! Common test utilities and fixtures.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use relay_meter_lib::collector::Source;
use relay_meter_lib::core::types::{add_days, day_of, start_of};
use relay_meter_lib::core::{
    AppCounts, DailyUsage, Day, LoadBalancer, MeterError, RelayCounts, Result, TodaysUsage,
};
use relay_meter_lib::storage::UsageBackend;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Today, as the meter and collector see it.
pub fn today() -> Day {
    day_of(Utc::now())
}

/// Midnight `offset` days from today.
pub fn midnight(offset: i64) -> DateTime<Utc> {
    start_of(add_days(today(), offset))
}

/// Build an application → counts map.
pub fn app_counts(entries: &[(&str, u64, u64)]) -> AppCounts {
    entries
        .iter()
        .map(|(app, success, failure)| ((*app).to_string(), RelayCounts::new(*success, *failure)))
        .collect()
}

/// Six finalized days before today, identical buckets.
pub fn fake_daily_metrics() -> DailyUsage {
    let bucket = app_counts(&[("app1", 2, 3), ("app2", 1, 5), ("app4", 5, 7)]);
    (1..7).map(|i| (add_days(today(), -i), bucket.clone())).collect()
}

/// Live counts for today.
pub fn fake_todays_metrics() -> TodaysUsage {
    app_counts(&[("app1", 50, 40), ("app2", 30, 70), ("app4", 500, 700)])
}

/// Backend serving canned data, with a switchable failure mode.
///
/// `daily_usage` ignores its bounds like a lax store would and records
/// every call.
#[derive(Default)]
pub struct FakeBackend {
    usage: DailyUsage,
    todays_usage: TodaysUsage,
    user_apps: HashMap<String, Vec<String>>,
    load_balancers: Vec<LoadBalancer>,
    failing: AtomicBool,
    daily_calls: Mutex<Vec<(Day, Day)>>,
    todays_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            usage: fake_daily_metrics(),
            todays_usage: fake_todays_metrics(),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: &str, apps: &[&str]) -> Self {
        self.user_apps
            .insert(user.to_string(), apps.iter().map(|app| (*app).to_string()).collect());
        self
    }

    pub fn with_load_balancer(mut self, id: &str, apps: &[&str]) -> Self {
        self.load_balancers.push(LoadBalancer::new(id, apps.iter().copied()));
        self
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn daily_calls(&self) -> Vec<(Day, Day)> {
        self.daily_calls.lock().clone()
    }

    pub fn todays_calls(&self) -> usize {
        self.todays_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(MeterError::storage("backend error"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl UsageBackend for FakeBackend {
    async fn daily_usage(&self, from: Day, to: Day) -> Result<DailyUsage> {
        self.daily_calls.lock().push((from, to));
        self.check()?;
        Ok(self.usage.clone())
    }

    async fn todays_usage(&self) -> Result<TodaysUsage> {
        self.todays_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.todays_usage.clone())
    }

    async fn user_apps(&self, user: &str) -> Result<Vec<String>> {
        self.check()?;
        Ok(self.user_apps.get(user).cloned().unwrap_or_default())
    }

    async fn load_balancer(&self, endpoint: &str) -> Result<Option<LoadBalancer>> {
        self.check()?;
        Ok(self.load_balancers.iter().find(|lb| lb.id == endpoint).cloned())
    }

    async fn load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        self.check()?;
        Ok(self.load_balancers.clone())
    }
}

/// Source serving canned data and recording what it was asked for.
#[derive(Default)]
pub struct FakeSource {
    daily: DailyUsage,
    todays: TodaysUsage,
    delay: Option<Duration>,
    lax_bounds: bool,
    failing: AtomicBool,
    daily_calls: Mutex<Vec<(Day, Day)>>,
    todays_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(daily: DailyUsage, todays: TodaysUsage) -> Self {
        Self {
            daily,
            todays,
            ..Self::default()
        }
    }

    /// Every `daily_counts` call takes this long.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `daily_counts` returns its whole history whatever the bounds.
    pub fn with_lax_bounds(mut self) -> Self {
        self.lax_bounds = true;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn daily_calls(&self) -> Vec<(Day, Day)> {
        self.daily_calls.lock().clone()
    }

    pub fn todays_calls(&self) -> usize {
        self.todays_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Source for FakeSource {
    async fn daily_counts(&self, from: Day, to: Day) -> Result<DailyUsage> {
        self.daily_calls.lock().push((from, to));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(MeterError::source("source unavailable"));
        }
        if self.lax_bounds {
            return Ok(self.daily.clone());
        }
        if from >= to {
            return Ok(DailyUsage::new());
        }

        Ok(self
            .daily
            .range(from..to)
            .map(|(day, apps)| (*day, apps.clone()))
            .collect())
    }

    async fn todays_counts(&self) -> Result<TodaysUsage> {
        self.todays_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MeterError::source("source unavailable"));
        }
        Ok(self.todays.clone())
    }
}
