//! Usage store traits.

use crate::core::{DailyUsage, Day, LoadBalancer, Result, TodaysUsage};
use std::sync::Arc;

/// Read side of the usage store, used by the meter.
///
/// `user_apps` and the load balancer lookups are called live on the query
/// path and are never cached by the meter.
#[async_trait::async_trait]
pub trait UsageBackend: Send + Sync {
    /// Finalized day buckets with `from <= day < to`.
    async fn daily_usage(&self, from: Day, to: Day) -> Result<DailyUsage>;

    /// The live snapshot for the current day.
    async fn todays_usage(&self) -> Result<TodaysUsage>;

    /// Applications owned by a user.
    async fn user_apps(&self, user: &str) -> Result<Vec<String>>;

    /// A load balancer and its members, or `None` if the endpoint is unknown.
    async fn load_balancer(&self, endpoint: &str) -> Result<Option<LoadBalancer>>;

    /// Every known load balancer.
    async fn load_balancers(&self) -> Result<Vec<LoadBalancer>>;
}

/// Write side of the usage store, used by the collector.
#[async_trait::async_trait]
pub trait UsageWriter: Send + Sync {
    /// First and last persisted day. Persisted days are assumed to have no
    /// gaps in between; `None` means nothing has been persisted yet.
    async fn persisted_span(&self) -> Result<Option<(Day, Day)>>;

    /// Store day buckets, replacing any existing bucket for the same day.
    async fn write_daily_usage(&self, usage: &DailyUsage) -> Result<()>;

    /// Replace the live snapshot for the current day.
    async fn write_todays_usage(&self, usage: &TodaysUsage) -> Result<()>;
}

/// A store serving both the meter and the collector.
pub trait UsageStore: UsageBackend + UsageWriter {}

impl<T: UsageBackend + UsageWriter + ?Sized> UsageStore for T {}

/// Splits one shared store into the two handles the meter and the
/// collector take.
pub fn split<S: UsageStore + 'static>(
    store: &Arc<S>,
) -> (Arc<dyn UsageBackend>, Arc<dyn UsageWriter>) {
    let backend: Arc<dyn UsageBackend> = Arc::clone(store) as Arc<dyn UsageBackend>;
    let writer: Arc<dyn UsageWriter> = Arc::clone(store) as Arc<dyn UsageWriter>;
    (backend, writer)
}
