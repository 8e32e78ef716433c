//! Command-line interface for the relay meter.
//!
//! Just run `relay-meter` to collect simulated traffic and keep the query
//! cache warm with sensible defaults.

use crate::core::config::ConfigBuilder;
use crate::core::{Config, MeterError, Result};
use crate::Application;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Relay usage meter with an incremental collector.
#[derive(Parser, Debug)]
#[command(name = "relay-meter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/relay-meter/config.yaml)
    #[arg(short, long, env = "RELAY_METER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "RELAY_METER_DEBUG")]
    pub debug: bool,

    /// How often the collector runs (e.g. "2m")
    #[arg(long, env = "RELAY_METER_COLLECT_INTERVAL", value_parser = humantime::parse_duration)]
    pub collect_interval: Option<Duration>,

    /// How often the query cache reloads (e.g. "60s")
    #[arg(long, env = "RELAY_METER_LOAD_INTERVAL", value_parser = humantime::parse_duration)]
    pub load_interval: Option<Duration>,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    ///
    /// Returns the file the configuration was read from, if any.
    pub fn load_config(&self) -> Result<(Config, Option<PathBuf>)> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => Self::default_config_path().filter(|path| path.exists()),
        };

        if let Some(path) = &config_path {
            builder = builder.from_file(path).map_err(|e| match e {
                MeterError::Io(e) => MeterError::config(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                )),
                other => other,
            })?;
        }

        Ok((self.build_config_from_args(builder)?, config_path))
    }

    /// `~/.config/relay-meter/config.yaml` on Linux, the platform config
    /// directory elsewhere.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("relay-meter").join("config.yaml"))
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(interval) = self.collect_interval {
            builder = builder.collect_interval(interval);
        }
        if let Some(interval) = self.load_interval {
            builder = builder.load_interval(interval);
        }

        builder.build()
    }

    /// Initialize logging based on configuration.
    ///
    /// `RUST_LOG` wins over everything; otherwise `--debug` selects debug
    /// level and `logging.level` applies.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = if self.debug {
            "debug"
        } else {
            config.logging.level.as_str()
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let registry = tracing_subscriber::registry().with(filter);
        let result = if config.logging.structured {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
                .try_init()
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(false).compact())
                .try_init()
        };

        result.map_err(|e| MeterError::config(format!("Failed to initialize logging: {}", e)))
    }
}

/// Execute the relay meter.
pub async fn execute(cli: Cli) -> Result<()> {
    // Load and validate configuration
    let (config, config_path) = cli.load_config()?;

    // Handle config validation flag
    if cli.check_config {
        println!("Configuration is valid!");
        if let Some(path) = &config_path {
            println!("  File: {}", path.display());
        }
        println!("  Load interval: {:?}", config.meter.load_interval);
        println!("  Max past days: {}", config.meter.max_past_days);
        println!("  Collect interval: {:?}", config.collector.collect_interval);
        println!("  Report interval: {:?}", config.collector.report_interval);
        println!("  Max archive age: {:?}", config.collector.max_archive_age);
        println!("  Simulated applications: {}", config.simulation.applications.len());
        return Ok(());
    }

    cli.init_logging(&config)?;
    match &config_path {
        Some(path) => tracing::info!("Loaded configuration from: {}", path.display()),
        None => tracing::debug!("No config file found, using defaults"),
    }

    Application::new(config)?.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "collector:\n  collect_interval: 5m\n  report_interval: 30s").unwrap();

        let cli = Cli::parse_from([
            "relay-meter",
            "--config",
            file.path().to_str().unwrap(),
            "--collect-interval",
            "90s",
        ]);
        let (config, path) = cli.load_config().unwrap();

        assert_eq!(path.as_deref(), Some(file.path()));
        assert_eq!(config.collector.collect_interval, Duration::from_secs(90));
        assert_eq!(config.collector.report_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let cli = Cli::parse_from(["relay-meter", "--config", "/nonexistent/relay-meter.yaml"]);
        assert!(matches!(cli.load_config(), Err(MeterError::Config(_))));
    }

    #[test]
    fn test_invalid_flag_combination_rejected() {
        let cli = Cli::parse_from(["relay-meter", "--collect-interval", "0s"]);
        let err = cli.load_config().map(|_| ()).unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
