//! Query responses.
//!
//! `from`/`to` hold the normalized `[from, to)` window on success. When a
//! range is rejected they echo the bounds the caller supplied.

use crate::core::{ApplicationId, RelayCounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relays of every application owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRelaysResponse {
    /// User the applications belong to
    pub user: String,
    /// Start of the window
    pub from: DateTime<Utc>,
    /// Exclusive end of the window
    pub to: DateTime<Utc>,
    /// The user's applications, sorted
    pub applications: Vec<ApplicationId>,
    /// Relays summed over all of the user's applications
    pub count: RelayCounts,
}

/// Network-wide relays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalRelaysResponse {
    /// Start of the window
    pub from: DateTime<Utc>,
    /// Exclusive end of the window
    pub to: DateTime<Utc>,
    /// Relays across every application
    pub count: RelayCounts,
}

/// Relays of a single application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRelaysResponse {
    /// Application public key
    pub application: ApplicationId,
    /// Start of the window
    pub from: DateTime<Utc>,
    /// Exclusive end of the window
    pub to: DateTime<Utc>,
    /// Relays of this application
    pub count: RelayCounts,
}

/// Relays of the applications behind a load balancer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerRelaysResponse {
    /// Load balancer endpoint id
    pub endpoint: String,
    /// Start of the window
    pub from: DateTime<Utc>,
    /// Exclusive end of the window
    pub to: DateTime<Utc>,
    /// Member applications in membership order
    pub applications: Vec<ApplicationId>,
    /// Relays summed over the member applications
    pub count: RelayCounts,
}

impl UserRelaysResponse {
    pub(crate) fn empty(user: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            user: user.to_string(),
            from,
            to,
            applications: Vec::new(),
            count: RelayCounts::default(),
        }
    }
}

impl TotalRelaysResponse {
    pub(crate) fn empty(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            count: RelayCounts::default(),
        }
    }
}

impl AppRelaysResponse {
    pub(crate) fn empty(application: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            application: application.to_string(),
            from,
            to,
            count: RelayCounts::default(),
        }
    }
}

impl LoadBalancerRelaysResponse {
    pub(crate) fn empty(endpoint: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            from,
            to,
            applications: Vec::new(),
            count: RelayCounts::default(),
        }
    }
}
