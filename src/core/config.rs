//! Configuration management for the relay meter.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Human readable durations (`90s`, `30days`)
//! - Validation and defaults

use crate::core::period::{whole_days, DEFAULT_MAX_PAST_DAYS, MAX_LOOKBACK_DAYS};
use crate::core::types::LoadBalancer;
use crate::core::{MeterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Complete configuration for the relay meter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Query cache configuration
    pub meter: MeterConfig,
    /// Collector configuration
    pub collector: CollectorConfig,
    /// Simulated source and directory used for local runs
    pub simulation: SimulationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Query cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// How often the cache is reloaded from the store
    #[serde(with = "humantime_serde")]
    pub load_interval: Duration,
    /// Days of history kept in memory, and the lookback for open-ended queries
    pub max_past_days: u32,
}

/// Collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// How often a collection cycle runs
    #[serde(with = "humantime_serde")]
    pub collect_interval: Duration,
    /// How often the countdown to the next cycle is logged
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
    /// Oldest history backfilled when nothing is persisted yet
    #[serde(with = "humantime_serde")]
    pub max_archive_age: Duration,
}

/// Simulated applications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Applications producing relays
    pub applications: Vec<SimulatedApplication>,
    /// Application ownership by user
    pub users: BTreeMap<String, Vec<String>>,
    /// Load balancer membership
    pub load_balancers: Vec<LoadBalancer>,
}

/// Traffic profile of one simulated application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedApplication {
    /// Application public key
    pub id: String,
    /// Average relays per full day
    pub daily_relays: u64,
    /// Share of relays that fail (0.0 to 1.0)
    pub failure_ratio: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Emit JSON lines instead of human readable output
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for MeterConfig {
    fn default() -> Self {
        MeterConfig {
            load_interval: Duration::from_secs(60),
            max_past_days: DEFAULT_MAX_PAST_DAYS,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            collect_interval: Duration::from_secs(120),
            report_interval: Duration::from_secs(10),
            max_archive_age: Duration::from_secs(u64::from(DEFAULT_MAX_PAST_DAYS) * 86_400),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let applications = vec![
            SimulatedApplication::new("app1", 20_000, 0.02),
            SimulatedApplication::new("app2", 8_000, 0.05),
            SimulatedApplication::new("app3", 1_500, 0.01),
            SimulatedApplication::new("app4", 50_000, 0.03),
        ];

        let mut users = BTreeMap::new();
        users.insert("user1".to_string(), vec!["app1".to_string(), "app2".to_string()]);
        users.insert("user2".to_string(), vec!["app3".to_string(), "app4".to_string()]);

        SimulationConfig {
            applications,
            users,
            load_balancers: vec![
                LoadBalancer::new("lb1", ["app1", "app2", "app3"]),
                LoadBalancer::new("lb2", ["app4"]),
            ],
        }
    }
}

impl SimulatedApplication {
    /// Create a traffic profile
    pub fn new(id: &str, daily_relays: u64, failure_ratio: f64) -> Self {
        Self {
            id: id.to_string(),
            daily_relays,
            failure_ratio,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.meter.load_interval.is_zero() {
            return Err(MeterError::config("load_interval must be greater than 0"));
        }

        if self.meter.max_past_days > MAX_LOOKBACK_DAYS {
            return Err(MeterError::config(format!(
                "max_past_days ({}) must not exceed {}",
                self.meter.max_past_days, MAX_LOOKBACK_DAYS
            )));
        }

        if whole_days(self.collector.max_archive_age) > MAX_LOOKBACK_DAYS {
            return Err(MeterError::config(format!(
                "max_archive_age ({:?}) must not exceed {} days",
                self.collector.max_archive_age, MAX_LOOKBACK_DAYS
            )));
        }

        if self.collector.collect_interval.is_zero() {
            return Err(MeterError::config("collect_interval must be greater than 0"));
        }

        if self.collector.report_interval.is_zero() {
            return Err(MeterError::config("report_interval must be greater than 0"));
        }

        if self.collector.report_interval > self.collector.collect_interval {
            return Err(MeterError::config(format!(
                "report_interval ({:?}) must not exceed collect_interval ({:?})",
                self.collector.report_interval, self.collector.collect_interval
            )));
        }

        for app in &self.simulation.applications {
            if !(0.0..=1.0).contains(&app.failure_ratio) {
                return Err(MeterError::config(format!(
                    "Invalid failure ratio for application '{}': {}",
                    app.id, app.failure_ratio
                )));
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| MeterError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file(self, path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        self.from_yaml(&yaml)
    }

    /// Set cache reload interval
    pub fn load_interval(mut self, interval: Duration) -> Self {
        self.config.meter.load_interval = interval;
        self
    }

    /// Set days of history kept in memory
    pub fn max_past_days(mut self, days: u32) -> Self {
        self.config.meter.max_past_days = days;
        self
    }

    /// Set collection interval
    pub fn collect_interval(mut self, interval: Duration) -> Self {
        self.config.collector.collect_interval = interval;
        self
    }

    /// Set countdown report interval
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.config.collector.report_interval = interval;
        self
    }

    /// Set backfill horizon
    pub fn max_archive_age(mut self, age: Duration) -> Self {
        self.config.collector.max_archive_age = age;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
