//! Core domain types, configuration and errors.
//!
//! Everything here is shared by the meter and the collector.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod period;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder};
pub use error::{MeterError, QueryResult, Rejected, Result};
pub use period::{normalize, Period};
pub use types::{
    AppCounts, ApplicationId, DailyUsage, Day, LoadBalancer, RelayCounts, TodaysUsage,
};
