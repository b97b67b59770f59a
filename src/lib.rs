pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod limiter;
pub mod notify;
pub mod probe;
pub mod recorder;
pub mod registry;
pub mod storage;
pub mod transition;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a monitored target
pub type TargetId = i64;

/// Identifier of the user owning a set of targets
pub type OwnerId = i64;

/// Chat a notification is delivered to
pub type ChatId = i64;

/// Longest accepted check interval, one year
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// Returns whether a received status code counts as "up"
pub fn is_reachable(status_code: u16) -> bool {
    (200..400).contains(&status_code)
}

/// Availability implied by a target's cached columns
///
/// `None` while the target has never been checked.
pub fn cached_availability(
    last_status_code: Option<u16>,
    last_checked_at: Option<DateTime<Utc>>,
) -> Option<Availability> {
    last_checked_at?;

    match last_status_code {
        Some(code) if is_reachable(code) => Some(Availability::Up),
        _ => Some(Availability::Down),
    }
}

/// Reachability of a target as seen by one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Up,
    Down,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Up => write!(f, "up"),
            Availability::Down => write!(f, "down"),
        }
    }
}

/// A monitored URL with its owner, interval and cached last-known status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub owner_id: OwnerId,
    pub url: String,

    /// Check interval in seconds (always >= 1)
    pub interval_secs: u64,

    /// Inactive targets never hold a live timer
    pub active: bool,

    pub last_status_code: Option<u16>,
    pub last_latency_ms: Option<u64>,

    /// Hex SHA-256 of the last 200 response body
    pub last_fingerprint: Option<String>,

    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Target {
    /// Cached availability, `None` while the target has never been checked
    pub fn availability(&self) -> Option<Availability> {
        cached_availability(self.last_status_code, self.last_checked_at)
    }
}

/// Immutable result of a single probe against a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub target_id: TargetId,
    pub checked_at: DateTime<Utc>,
    pub status_code: Option<u16>,
    pub latency_ms: Option<u64>,
    pub reachable: bool,
    pub fingerprint: Option<String>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn availability(&self) -> Availability {
        if self.reachable {
            Availability::Up
        } else {
            Availability::Down
        }
    }
}
