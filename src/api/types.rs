//! API request and response types

use serde::{Deserialize, Serialize};

use crate::actors::messages::JobSnapshot;
use crate::registry::RegistryStats;
use crate::storage::OutcomeRow;
use crate::{Availability, ChatId, Target, TargetId};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub timestamp: String,
}

/// A target with its cached availability and live job
#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    #[serde(flatten)]
    pub target: Target,

    /// `None` until the first probe completes
    pub availability: Option<Availability>,

    /// `None` when paused or not scheduled
    pub job: Option<JobSnapshot>,
}

impl TargetView {
    pub fn new(target: Target, job: Option<JobSnapshot>) -> Self {
        Self {
            availability: target.availability(),
            target,
            job,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetsResponse {
    pub targets: Vec<TargetView>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTargetRequest {
    pub url: String,

    /// Seconds between checks; the configured default when omitted
    #[serde(default)]
    pub interval: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntervalRequest {
    pub seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterOwnerRequest {
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub target_id: TargetId,
    pub outcomes: Vec<OutcomeRow>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub timestamp: String,

    #[serde(flatten)]
    pub stats: RegistryStats,
}
