//! Configuration system tests.

use relay_meter_lib::core::{Config, ConfigBuilder, MeterError};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.meter.load_interval, Duration::from_secs(60));
    assert_eq!(config.meter.max_past_days, 30);
    assert_eq!(config.collector.collect_interval, Duration::from_secs(120));
    assert_eq!(config.collector.report_interval, Duration::from_secs(10));
    assert_eq!(config.collector.max_archive_age, Duration::from_secs(30 * 86_400));
    assert_eq!(config.simulation.applications.len(), 4);
    assert_eq!(config.simulation.load_balancers.len(), 2);
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
meter:
  load_interval: 15s
  max_past_days: 7
collector:
  collect_interval: 10m
  report_interval: 1m
  max_archive_age: 14days
simulation:
  applications:
    - id: wallet
      daily_relays: 5000
      failure_ratio: 0.02
  users:
    carol: [wallet]
  load_balancers:
    - id: lb-wallet
      applications: [wallet]
"#
    )
    .unwrap();

    let config = ConfigBuilder::new().from_file(file.path()).unwrap().build().unwrap();

    assert_eq!(config.meter.load_interval, Duration::from_secs(15));
    assert_eq!(config.meter.max_past_days, 7);
    assert_eq!(config.collector.collect_interval, Duration::from_secs(600));
    assert_eq!(config.collector.report_interval, Duration::from_secs(60));
    assert_eq!(config.collector.max_archive_age, Duration::from_secs(14 * 86_400));
    assert_eq!(config.simulation.applications[0].id, "wallet");
    assert_eq!(config.simulation.users["carol"], vec!["wallet".to_string()]);
    assert_eq!(config.simulation.load_balancers[0].applications, vec!["wallet".to_string()]);
}

#[test]
fn test_builder_overrides_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "meter:\n  load_interval: 15s").unwrap();

    let config = ConfigBuilder::new()
        .from_file(file.path())
        .unwrap()
        .load_interval(Duration::from_secs(5))
        .build()
        .unwrap();

    assert_eq!(config.meter.load_interval, Duration::from_secs(5));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = ConfigBuilder::new().from_file(&dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(MeterError::Io(_))));
}

#[test]
fn test_malformed_yaml() {
    let result = ConfigBuilder::new().from_yaml("meter: [not, a, map]");
    assert!(matches!(result, Err(MeterError::Config(_))));

    let result = ConfigBuilder::new().from_yaml("collector:\n  collect_interval: soon\n");
    assert!(matches!(result, Err(MeterError::Config(_))));
}

#[test]
fn test_invalid_values_rejected() {
    assert!(ConfigBuilder::new().load_interval(Duration::ZERO).build().is_err());
    assert!(ConfigBuilder::new().collect_interval(Duration::ZERO).build().is_err());
    assert!(ConfigBuilder::new().report_interval(Duration::ZERO).build().is_err());
    assert!(ConfigBuilder::new()
        .collect_interval(Duration::from_secs(30))
        .report_interval(Duration::from_secs(60))
        .build()
        .is_err());
}
