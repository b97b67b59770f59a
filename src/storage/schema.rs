//! Row types shared by all storage backends
//!
//! The store owns three record kinds:
//!
//! - **owners**: owner id → chat id used for notification delivery
//! - **targets**: monitored URLs plus the cached result of their last probe
//! - **outcomes**: append-only probe history, one row per executed probe
//!
//! Timestamps are kept as `DateTime<Utc>` in memory and as Unix
//! milliseconds in SQLite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Availability, ChatId, OwnerId, ProbeOutcome, TargetId};

/// Owner registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub chat_id: ChatId,
}

/// Data needed to create a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTarget {
    pub owner_id: OwnerId,
    pub url: String,
    pub interval_secs: u64,
}

/// Cached "last probe" columns of a target
#[derive(Debug, Clone, PartialEq)]
pub struct TargetCache {
    pub status_code: Option<u16>,
    pub latency_ms: Option<u64>,
    pub fingerprint: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl From<&ProbeOutcome> for TargetCache {
    fn from(outcome: &ProbeOutcome) -> Self {
        Self {
            status_code: outcome.status_code,
            latency_ms: outcome.latency_ms,
            fingerprint: outcome.fingerprint.clone(),
            checked_at: outcome.checked_at,
        }
    }
}

/// A probe outcome as stored in history, with its assigned row id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRow {
    pub id: i64,

    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

/// Result of `record_outcome`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOutcome {
    pub row: OutcomeRow,

    /// Cached availability this outcome replaced, read under the same
    /// transaction or lock as the write
    pub previous: Option<Availability>,
}

/// Filter for owner-scoped mutations; `None` matches any owner
pub type OwnerScope = Option<OwnerId>;

/// Helper to convert timestamp to Unix milliseconds for SQLite
pub fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Helper to convert Unix milliseconds from SQLite to DateTime
pub fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}
