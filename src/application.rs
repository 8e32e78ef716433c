//! Main application entry point for the relay meter.

use crate::collector::{Collector, CollectorOptions, SimulatedSource};
use crate::core::{Config, Result};
use crate::meter::{RelayMeter, RelayMeterOptions};
use crate::storage::{split, InMemoryUsageStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Wires the collector, the store and the meter together.
pub struct Application {
    /// Usage store shared by collector and meter
    store: Arc<InMemoryUsageStore>,
    /// Incremental collector feeding the store
    collector: Arc<Collector>,
    /// Query cache over the store
    meter: Arc<RelayMeter>,
    /// Application configuration
    config: Config,
}

impl Application {
    /// Create a new Application with the given configuration.
    ///
    /// Starts the meter's background loader, so this must run inside a
    /// tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(InMemoryUsageStore::from_simulation(&config.simulation));
        let (backend, writer) = split(&store);

        let source = Arc::new(SimulatedSource::new(&config.simulation));
        let collector = Arc::new(Collector::new(
            source,
            writer,
            CollectorOptions::from(&config.collector),
        ));

        let meter = Arc::new(RelayMeter::new(backend, RelayMeterOptions::from(&config.meter)));

        Ok(Self {
            store,
            collector,
            meter,
            config,
        })
    }

    /// Run until Ctrl-C, then stop both loops and wait for them.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Starting relay meter application");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let collector_handle = self.collector.start(shutdown_rx.clone());

        let meter = Arc::clone(&self.meter);
        let summary_every = self.config.meter.load_interval;
        let summary_handle =
            tokio::spawn(async move { report_summaries(meter, summary_every, shutdown_rx).await });

        tokio::signal::ctrl_c().await?;
        tracing::warn!("Shutdown requested");

        let _ = shutdown.send(true);
        for (name, handle) in [("collector", collector_handle), ("summary", summary_handle)] {
            if let Err(e) = handle.await {
                tracing::error!(task = name, error = %e, "Task ended abnormally");
            }
        }
        self.meter.shutdown().await;

        tracing::info!("Relay meter application stopped");
        Ok(())
    }

    /// Get a reference to the usage store.
    pub fn store(&self) -> &Arc<InMemoryUsageStore> {
        &self.store
    }

    /// Get a reference to the collector.
    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    /// Get a reference to the meter.
    pub fn meter(&self) -> &Arc<RelayMeter> {
        &self.meter
    }
}

/// Periodically log network and per load balancer usage.
async fn report_summaries(
    meter: Arc<RelayMeter>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => log_summary(&meter).await,
            _ = shutdown.changed() => break,
        }
    }
}

async fn log_summary(meter: &RelayMeter) {
    match meter.total_relays(None, None) {
        Ok(total) => tracing::info!(
            from = %total.from,
            to = %total.to,
            success = total.count.success,
            failure = total.count.failure,
            "Network relays"
        ),
        Err(rejected) => tracing::warn!(error = %rejected, "Failed to summarize network relays"),
    }

    match meter.all_load_balancers_relays(None, None).await {
        Ok(load_balancers) => {
            for lb in load_balancers {
                tracing::info!(
                    endpoint = %lb.endpoint,
                    applications = lb.applications.len(),
                    success = lb.count.success,
                    failure = lb.count.failure,
                    "Load balancer relays"
                );
            }
        },
        Err(rejected) => {
            tracing::warn!(error = %rejected, "Failed to summarize load balancer relays");
        },
    }
}
