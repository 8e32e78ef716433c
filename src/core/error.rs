use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Invalid timespan: from {from} is after to {to}")]
    InvalidTimeRange { from: DateTime<Utc>, to: DateTime<Utc> },

    #[error("Load balancer not found: {0}")]
    LoadBalancerNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for meter operations
pub type Result<T> = std::result::Result<T, MeterError>;

impl MeterError {
    /// Creates a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a new source error
    pub fn source<S: Into<String>>(msg: S) -> Self {
        Self::Source(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if retrying on the next cycle may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Source(_) | Self::Io(_))
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidTimeRange { .. } => "validation",
            Self::LoadBalancerNotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::Source(_) => "source",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

/// A failed query, still carrying the response the caller should echo back.
///
/// Range validation failures keep the caller's original bounds and zero
/// counts in `response`; collection-returning queries carry an empty
/// collection.
#[derive(Debug)]
pub struct Rejected<R> {
    /// Response to hand back alongside the error
    pub response: R,
    /// Why the query failed
    pub error: MeterError,
}

impl<R> Rejected<R> {
    pub(crate) fn new(response: R, error: MeterError) -> Self {
        Self { response, error }
    }

    /// Drops the response and keeps the underlying error
    pub fn into_error(self) -> MeterError {
        self.error
    }
}

impl<R> fmt::Display for Rejected<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<R: fmt::Debug> std::error::Error for Rejected<R> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Result type for meter queries
pub type QueryResult<R> = std::result::Result<R, Rejected<R>>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_creation() {
        let err = MeterError::storage("connection reset");
        assert_eq!(err.to_string(), "Storage error: connection reset");
        assert_eq!(err.category(), "storage");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(MeterError::source("upstream timeout").is_recoverable());
        assert!(!MeterError::LoadBalancerNotFound("lb1".into()).is_recoverable());
        assert!(!MeterError::config("bad interval").is_recoverable());
    }

    #[test]
    fn test_invalid_range_message_mentions_timespan() {
        let from = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let err = MeterError::InvalidTimeRange { from, to };
        assert!(err.to_string().contains("Invalid timespan"));
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_rejected_exposes_source() {
        use std::error::Error as _;

        let rejected = Rejected::new(0_u64, MeterError::LoadBalancerNotFound("lb9".into()));
        assert_eq!(rejected.to_string(), "Load balancer not found: lb9");
        assert!(rejected.source().is_some());
        assert!(matches!(rejected.into_error(), MeterError::LoadBalancerNotFound(id) if id == "lb9"));
    }
}
