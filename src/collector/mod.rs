//! Incremental relay usage collector.
//!
//! Pulls day-bucketed counts from a [`Source`] and persists them through a
//! [`UsageWriter`]. Scheduled cycles resume after the last persisted day, so
//! finalized days are never requested twice and no day is skipped. Today is
//! not final yet and is pulled again on every cycle.

pub mod simulated;

pub use simulated::SimulatedSource;

use crate::core::config::CollectorConfig;
use crate::core::period::{normalize, whole_days, DEFAULT_MAX_PAST_DAYS};
use crate::core::types::{add_days, day_of, start_of};
use crate::core::{DailyUsage, Day, MeterError, Period, Result, TodaysUsage};
use crate::storage::UsageWriter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Upstream producer of relay counts.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Per-day counts for days with `from <= day < to`.
    async fn daily_counts(&self, from: Day, to: Day) -> Result<DailyUsage>;

    /// Counts accumulated so far today.
    async fn todays_counts(&self) -> Result<TodaysUsage>;
}

/// Collector options.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// How often a collection cycle runs
    pub collect_interval: Duration,
    /// How often the countdown to the next cycle is logged
    pub report_interval: Duration,
    /// Oldest history backfilled when nothing is persisted yet
    pub max_archive_age: Duration,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        CollectorConfig::default().into()
    }
}

impl From<CollectorConfig> for CollectorOptions {
    fn from(config: CollectorConfig) -> Self {
        Self {
            collect_interval: config.collect_interval,
            report_interval: config.report_interval,
            max_archive_age: config.max_archive_age,
        }
    }
}

impl From<&CollectorConfig> for CollectorOptions {
    fn from(config: &CollectorConfig) -> Self {
        config.clone().into()
    }
}

/// What a collection cycle pulled and wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    /// Window requested from the source
    pub period: Period,
    /// Day buckets written
    pub days_written: usize,
    /// Applications in the rewritten today snapshot
    pub todays_applications: usize,
}

/// First instant the next scheduled cycle should collect from.
///
/// With nothing persisted this is `max_archive_age` before `now`. Otherwise
/// collection resumes the day after the last persisted day, but never later
/// than today.
///
/// Fails with [`MeterError::Config`] when `max_archive_age` reaches past the
/// representable calendar.
pub fn next_collection_start(
    span: Option<(Day, Day)>,
    now: DateTime<Utc>,
    max_archive_age: chrono::Duration,
) -> Result<DateTime<Utc>> {
    match span {
        None => now.checked_sub_signed(max_archive_age).ok_or_else(|| {
            MeterError::config(format!("max_archive_age out of range: {}", max_archive_age))
        }),
        Some((_, last)) => Ok(start_of(add_days(last, 1).min(day_of(now)))),
    }
}

/// Periodically copies relay counts from a source into the usage store.
pub struct Collector {
    source: Arc<dyn Source>,
    writer: Arc<dyn UsageWriter>,
    options: CollectorOptions,
    cycle: Mutex<()>,
}

impl Collector {
    /// Create a new collector.
    pub fn new(
        source: Arc<dyn Source>,
        writer: Arc<dyn UsageWriter>,
        mut options: CollectorOptions,
    ) -> Self {
        if options.collect_interval.is_zero() {
            options.collect_interval = CollectorOptions::default().collect_interval;
        }
        if options.report_interval.is_zero() || options.report_interval > options.collect_interval
        {
            options.report_interval = options.collect_interval;
        }

        Self {
            source,
            writer,
            options,
            cycle: Mutex::new(()),
        }
    }

    /// Collect everything from `from` up to now, overwriting what is stored.
    ///
    /// Bypasses the gap tracking of scheduled cycles and is meant for
    /// operator-triggered backfills. Collection always extends to the
    /// present, so `requested_to` is only logged. Today is re-pulled as well.
    pub async fn collect(
        &self,
        from: Option<DateTime<Utc>>,
        requested_to: Option<DateTime<Utc>>,
    ) -> Result<CollectionReport> {
        let _cycle = self.cycle.lock().await;

        if let Some(to) = requested_to {
            tracing::debug!(requested_to = %to, "Manual collection extends to the present");
        }
        self.collect_window(from, Utc::now()).await
    }

    /// Collect the days missing since the last persisted day, plus today.
    pub async fn collect_pending(&self) -> Result<CollectionReport> {
        let _cycle = self.cycle.lock().await;

        let now = Utc::now();
        let span = self.writer.persisted_span().await?;
        let from = next_collection_start(span, now, self.archive_age()?)?;

        tracing::debug!(?span, from = %from, "Computed next collection window");
        self.collect_window(Some(from), now).await
    }

    /// Spawn the scheduling loop.
    pub fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        tokio::spawn(async move { collector.run(shutdown).await })
    }

    /// Collect once, then every `collect_interval` until `shutdown` fires.
    ///
    /// The countdown is logged every `report_interval`. Shutdown is only
    /// observed between cycles; a cycle in progress always completes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            collect_interval = ?self.options.collect_interval,
            report_interval = ?self.options.report_interval,
            "Collector started"
        );

        self.run_cycle().await;

        let report_every = self.options.report_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + report_every, report_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut remaining = self.options.collect_interval;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    remaining = remaining.saturating_sub(report_every);
                    if remaining.is_zero() {
                        self.run_cycle().await;
                        remaining = self.options.collect_interval;
                    } else {
                        tracing::info!("Will collect data in {} seconds...", remaining.as_secs());
                    }
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }

        tracing::warn!("Shutdown requested, collector exiting");
    }

    async fn run_cycle(&self) {
        match self.collect_pending().await {
            Ok(report) => tracing::info!(
                from = %report.period.from,
                to = %report.period.to,
                days = report.days_written,
                todays_applications = report.todays_applications,
                "Collected relay usage"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                category = e.category(),
                retry = e.is_recoverable(),
                "Failed to collect data"
            ),
        }
    }

    async fn collect_window(
        &self,
        from: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<CollectionReport> {
        let period = normalize(from, Some(now), now, self.archive_days())?;

        // Today is still open; its counts only ever go to the live snapshot.
        let finalized = period.from..period.historical_end();
        let mut counts = self.source.daily_counts(finalized.start, finalized.end).await?;
        counts.retain(|day, _| finalized.contains(day));
        self.writer.write_daily_usage(&counts).await?;

        let todays = self.source.todays_counts().await?;
        self.writer.write_todays_usage(&todays).await?;

        Ok(CollectionReport {
            period,
            days_written: counts.len(),
            todays_applications: todays.len(),
        })
    }

    fn archive_days(&self) -> u32 {
        match whole_days(self.options.max_archive_age) {
            0 => DEFAULT_MAX_PAST_DAYS,
            days => days,
        }
    }

    fn archive_age(&self) -> Result<chrono::Duration> {
        if self.options.max_archive_age.is_zero() {
            return Ok(chrono::Duration::days(i64::from(DEFAULT_MAX_PAST_DAYS)));
        }
        chrono::Duration::from_std(self.options.max_archive_age)
            .map_err(|e| MeterError::config(format!("max_archive_age out of range: {}", e)))
    }
}
