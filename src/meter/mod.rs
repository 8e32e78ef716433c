//! Relay usage queries over an in-memory cache.
//!
//! [`RelayMeter`] keeps a [`CacheSnapshot`] of the last `max_past_days` of
//! finalized day buckets plus today's live counts. A background task reloads
//! it from the store every `load_interval` and publishes the result with a
//! single atomic swap, so queries never wait on the store for usage data and
//! never observe a half-built cache.

pub mod responses;
pub mod snapshot;

pub use responses::{
    AppRelaysResponse, LoadBalancerRelaysResponse, TotalRelaysResponse, UserRelaysResponse,
};
pub use snapshot::CacheSnapshot;

use crate::core::config::MeterConfig;
use crate::core::period::{normalize, DEFAULT_MAX_PAST_DAYS};
use crate::core::types::day_of;
use crate::core::{LoadBalancer, MeterError, Period, QueryResult, Rejected, Result};
use crate::storage::UsageBackend;
use arc_swap::ArcSwap;
use chrono::{DateTime, Days, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Relay meter options.
#[derive(Debug, Clone)]
pub struct RelayMeterOptions {
    /// How often the cache is reloaded from the store
    pub load_interval: Duration,
    /// Days of history kept in memory; zero selects the default of 30
    pub max_past_days: u32,
}

impl Default for RelayMeterOptions {
    fn default() -> Self {
        Self {
            load_interval: Duration::from_secs(60),
            max_past_days: DEFAULT_MAX_PAST_DAYS,
        }
    }
}

impl From<&MeterConfig> for RelayMeterOptions {
    fn from(config: &MeterConfig) -> Self {
        Self {
            load_interval: config.load_interval,
            max_past_days: config.max_past_days,
        }
    }
}

impl RelayMeterOptions {
    fn retention_days(&self) -> u32 {
        if self.max_past_days == 0 {
            DEFAULT_MAX_PAST_DAYS
        } else {
            self.max_past_days
        }
    }
}

/// Loads snapshots from the store and publishes them.
///
/// Shared between the background task and [`RelayMeter::refresh`].
#[derive(Clone)]
struct SnapshotLoader {
    backend: Arc<dyn UsageBackend>,
    current: Arc<ArcSwap<CacheSnapshot>>,
    generations: Arc<AtomicU64>,
    retention_days: u32,
}

impl SnapshotLoader {
    /// Run one load cycle. Returns whether the new snapshot was installed.
    async fn load(&self) -> Result<bool> {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let today = day_of(Utc::now());
        let from = today
            .checked_sub_days(Days::new(u64::from(self.retention_days)))
            .ok_or_else(|| {
                MeterError::config(format!("max_past_days out of range: {}", self.retention_days))
            })?;

        let mut daily = self.backend.daily_usage(from, today).await?;
        daily.retain(|day, _| *day >= from && *day < today);
        let todays = self.backend.todays_usage().await?;

        let fresh = Arc::new(CacheSnapshot {
            daily,
            today: todays,
            loaded_at: Some(Utc::now()),
            generation,
        });

        Ok(self.install(fresh))
    }

    /// Publish `fresh` unless a load that started later already landed.
    fn install(&self, fresh: Arc<CacheSnapshot>) -> bool {
        let previous = self.current.rcu(|current| {
            if current.generation > fresh.generation {
                Arc::clone(current)
            } else {
                Arc::clone(&fresh)
            }
        });

        let installed = previous.generation < fresh.generation;
        if installed {
            tracing::debug!(
                generation = fresh.generation,
                days = fresh.daily.len(),
                todays_applications = fresh.today.len(),
                "Installed relay usage snapshot"
            );
        } else {
            tracing::debug!(
                generation = fresh.generation,
                newer = previous.generation,
                "Discarded stale relay usage snapshot"
            );
        }
        installed
    }

    async fn run(self, load_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(load_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.load().await {
                        tracing::warn!(
                            error = %e,
                            retry = e.is_recoverable(),
                            "Failed to load relay usage, keeping previous snapshot"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }

        tracing::info!("Relay meter loader exiting");
    }
}

/// In-memory relay usage meter.
pub struct RelayMeter {
    backend: Arc<dyn UsageBackend>,
    loader: SnapshotLoader,
    options: RelayMeterOptions,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RelayMeter {
    /// Create a meter and start its background loader.
    ///
    /// Must be called from within a tokio runtime. The first load starts
    /// immediately; until it completes every query sees an empty cache.
    /// A zero `load_interval` selects the default.
    pub fn new(backend: Arc<dyn UsageBackend>, mut options: RelayMeterOptions) -> Self {
        if options.load_interval.is_zero() {
            options.load_interval = RelayMeterOptions::default().load_interval;
        }

        let loader = SnapshotLoader {
            backend: Arc::clone(&backend),
            current: Arc::new(ArcSwap::from_pointee(CacheSnapshot::default())),
            generations: Arc::new(AtomicU64::new(0)),
            retention_days: options.retention_days(),
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(loader.clone().run(options.load_interval, shutdown_rx));

        tracing::info!(
            load_interval = ?options.load_interval,
            max_past_days = options.retention_days(),
            "Relay meter started"
        );

        Self {
            backend,
            loader,
            options,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Reload the cache now, outside the regular schedule.
    ///
    /// Returns `false` if a load that started later finished first.
    pub async fn refresh(&self) -> Result<bool> {
        self.loader.load().await
    }

    /// The snapshot queries currently run against.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.loader.current.load_full()
    }

    /// When the cache was last filled, if ever.
    pub fn last_loaded(&self) -> Option<DateTime<Utc>> {
        self.loader.current.load().loaded_at
    }

    /// Stop the background loader and wait for it to finish.
    ///
    /// A load already in progress completes first.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Relay meter loader ended abnormally");
            }
        }
    }

    /// Relays of every application owned by `user`.
    pub async fn user_relays(
        &self,
        user: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> QueryResult<UserRelaysResponse> {
        let period = self.period(from, to, |from, to| UserRelaysResponse::empty(user, from, to))?;

        let mut applications = match self.backend.user_apps(user).await {
            Ok(apps) => apps,
            Err(error) => {
                let response =
                    UserRelaysResponse::empty(user, period.from_datetime(), period.to_datetime());
                return Err(Rejected::new(response, error));
            },
        };
        applications.sort();
        applications.dedup();

        let count = self
            .snapshot()
            .apps_count(applications.iter().map(String::as_str), &period);

        Ok(UserRelaysResponse {
            user: user.to_string(),
            from: period.from_datetime(),
            to: period.to_datetime(),
            applications,
            count,
        })
    }

    /// Relays across the whole network.
    pub fn total_relays(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> QueryResult<TotalRelaysResponse> {
        let period = self.period(from, to, TotalRelaysResponse::empty)?;

        Ok(TotalRelaysResponse {
            from: period.from_datetime(),
            to: period.to_datetime(),
            count: self.snapshot().total_count(&period),
        })
    }

    /// Relays of one application. Unknown applications count zero.
    pub fn app_relays(
        &self,
        app: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> QueryResult<AppRelaysResponse> {
        let period = self.period(from, to, |from, to| AppRelaysResponse::empty(app, from, to))?;

        Ok(AppRelaysResponse {
            application: app.to_string(),
            from: period.from_datetime(),
            to: period.to_datetime(),
            count: self.snapshot().app_count(app, &period),
        })
    }

    /// Relays of every application seen in the window, ordered by id.
    pub fn all_apps_relays(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> QueryResult<Vec<AppRelaysResponse>> {
        let period = self.period(from, to, |_, _| Vec::new())?;
        let snapshot = self.snapshot();

        Ok(snapshot
            .applications(&period)
            .into_iter()
            .map(|app| AppRelaysResponse {
                application: app.to_string(),
                from: period.from_datetime(),
                to: period.to_datetime(),
                count: snapshot.app_count(app, &period),
            })
            .collect())
    }

    /// Relays of the applications behind a load balancer endpoint.
    ///
    /// Fails with [`MeterError::LoadBalancerNotFound`] for unknown endpoints;
    /// store failures are returned as they are.
    pub async fn load_balancer_relays(
        &self,
        endpoint: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> QueryResult<LoadBalancerRelaysResponse> {
        let period = self.period(from, to, |from, to| {
            LoadBalancerRelaysResponse::empty(endpoint, from, to)
        })?;

        let rejected = |error| {
            let response = LoadBalancerRelaysResponse::empty(
                endpoint,
                period.from_datetime(),
                period.to_datetime(),
            );
            Rejected::new(response, error)
        };

        let load_balancer = match self.backend.load_balancer(endpoint).await {
            Ok(Some(lb)) => lb,
            Ok(None) => {
                return Err(rejected(MeterError::LoadBalancerNotFound(endpoint.to_string())))
            },
            Err(error) => return Err(rejected(error)),
        };

        Ok(Self::load_balancer_summary(&self.snapshot(), load_balancer, &period))
    }

    /// Relays of every known load balancer.
    ///
    /// Any store failure aborts the whole call with an empty collection.
    pub async fn all_load_balancers_relays(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> QueryResult<Vec<LoadBalancerRelaysResponse>> {
        let period = self.period(from, to, |_, _| Vec::new())?;

        let load_balancers = self
            .backend
            .load_balancers()
            .await
            .map_err(|error| Rejected::new(Vec::new(), error))?;

        let snapshot = self.snapshot();
        Ok(load_balancers
            .into_iter()
            .map(|lb| Self::load_balancer_summary(&snapshot, lb, &period))
            .collect())
    }

    fn load_balancer_summary(
        snapshot: &CacheSnapshot,
        load_balancer: LoadBalancer,
        period: &Period,
    ) -> LoadBalancerRelaysResponse {
        let count = snapshot.apps_count(load_balancer.applications.iter().map(String::as_str), period);

        LoadBalancerRelaysResponse {
            endpoint: load_balancer.id,
            from: period.from_datetime(),
            to: period.to_datetime(),
            applications: load_balancer.applications,
            count,
        }
    }

    /// Normalize a query range, building the rejection response from the
    /// caller's bounds when it is invalid.
    fn period<R, F>(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        empty: F,
    ) -> std::result::Result<Period, Rejected<R>>
    where
        F: FnOnce(DateTime<Utc>, DateTime<Utc>) -> R,
    {
        let now = Utc::now();
        normalize(from, to, now, self.options.max_past_days).map_err(|error| {
            let (from, to) = match &error {
                MeterError::InvalidTimeRange { from, to } => (*from, *to),
                _ => (from.unwrap_or(now), to.unwrap_or(now)),
            };
            Rejected::new(empty(from, to), error)
        })
    }
}

impl Drop for RelayMeter {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
