//! In-memory storage backend (no persistence)
//!
//! Used when `storage.backend = "none"` and throughout the test suite.
//! All state lives behind a single `RwLock`, so `record_outcome` is
//! trivially atomic: the history row and the cache update happen under
//! the same write guard.
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Unbounded history**: retention cleanup is the only thing trimming it

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{NewTarget, OutcomeRow, OwnerScope, RecordedOutcome, TargetCache};
use crate::{ChatId, OwnerId, ProbeOutcome, Target, TargetId};

#[derive(Debug, Default)]
struct MemoryState {
    owners: HashMap<OwnerId, ChatId>,
    targets: BTreeMap<TargetId, Target>,

    /// History per target, oldest first
    outcomes: HashMap<TargetId, Vec<OutcomeRow>>,

    last_target_id: TargetId,
    last_outcome_id: i64,
    closed: bool,
}

impl MemoryState {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn owned_target_mut(&mut self, id: TargetId, owner: OwnerScope) -> Option<&mut Target> {
        self.targets
            .get_mut(&id)
            .filter(|target| owner.is_none_or(|owner_id| target.owner_id == owner_id))
    }

    fn append(&mut self, outcome: &ProbeOutcome) -> Option<OutcomeRow> {
        if !self.targets.contains_key(&outcome.target_id) {
            return None;
        }

        self.last_outcome_id += 1;
        let row = OutcomeRow {
            id: self.last_outcome_id,
            outcome: outcome.clone(),
        };
        self.outcomes
            .entry(outcome.target_id)
            .or_default()
            .push(row.clone());

        Some(row)
    }

    fn update_cache(&mut self, id: TargetId, cache: &TargetCache) -> bool {
        let Some(target) = self.targets.get_mut(&id) else {
            return false;
        };

        target.last_status_code = cache.status_code;
        target.last_latency_ms = cache.latency_ms;
        target.last_fingerprint = cache.fingerprint.clone();
        target.last_checked_at = Some(cache.checked_at);
        true
    }
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_active_targets(&self) -> StorageResult<Vec<Target>> {
        let state = self.state.read().await;
        state.ensure_open()?;

        Ok(state
            .targets
            .values()
            .filter(|target| target.active)
            .cloned()
            .collect())
    }

    async fn get_target(&self, id: TargetId) -> StorageResult<Option<Target>> {
        let state = self.state.read().await;
        state.ensure_open()?;

        Ok(state.targets.get(&id).cloned())
    }

    async fn append_outcome(&self, outcome: &ProbeOutcome) -> StorageResult<Option<OutcomeRow>> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        Ok(state.append(outcome))
    }

    async fn update_target_cache(&self, id: TargetId, cache: &TargetCache) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        Ok(state.update_cache(id, cache))
    }

    async fn record_outcome(
        &self,
        outcome: &ProbeOutcome,
    ) -> StorageResult<Option<RecordedOutcome>> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        let previous = state
            .targets
            .get(&outcome.target_id)
            .and_then(Target::availability);

        let Some(row) = state.append(outcome) else {
            debug!("target {} gone, outcome discarded", outcome.target_id);
            return Ok(None);
        };
        state.update_cache(outcome.target_id, &TargetCache::from(outcome));

        Ok(Some(RecordedOutcome { row, previous }))
    }

    async fn upsert_owner(&self, owner_id: OwnerId, chat_id: ChatId) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        state.owners.insert(owner_id, chat_id);
        Ok(())
    }

    async fn owner_chat(&self, owner_id: OwnerId) -> StorageResult<Option<ChatId>> {
        let state = self.state.read().await;
        state.ensure_open()?;

        Ok(state.owners.get(&owner_id).copied())
    }

    async fn add_target(&self, target: NewTarget) -> StorageResult<Target> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        state.last_target_id += 1;
        let target = Target {
            id: state.last_target_id,
            owner_id: target.owner_id,
            url: target.url,
            interval_secs: target.interval_secs,
            active: true,
            last_status_code: None,
            last_latency_ms: None,
            last_fingerprint: None,
            last_checked_at: None,
            created_at: Utc::now(),
        };
        state.targets.insert(target.id, target.clone());

        Ok(target)
    }

    async fn list_targets_by_owner(&self, owner_id: OwnerId) -> StorageResult<Vec<Target>> {
        let state = self.state.read().await;
        state.ensure_open()?;

        Ok(state
            .targets
            .values()
            .filter(|target| target.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn remove_target(&self, id: TargetId, owner: OwnerScope) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        if state.owned_target_mut(id, owner).is_none() {
            return Ok(false);
        }

        state.targets.remove(&id);
        state.outcomes.remove(&id);
        Ok(true)
    }

    async fn update_interval(
        &self,
        id: TargetId,
        interval_secs: u64,
        owner: OwnerScope,
    ) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        Ok(match state.owned_target_mut(id, owner) {
            Some(target) => {
                target.interval_secs = interval_secs;
                true
            }
            None => false,
        })
    }

    async fn set_active(
        &self,
        id: TargetId,
        active: bool,
        owner: OwnerScope,
    ) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        Ok(match state.owned_target_mut(id, owner) {
            Some(target) => {
                target.active = active;
                true
            }
            None => false,
        })
    }

    async fn list_recent_outcomes(
        &self,
        id: TargetId,
        limit: usize,
    ) -> StorageResult<Vec<OutcomeRow>> {
        let state = self.state.read().await;
        state.ensure_open()?;

        Ok(state
            .outcomes
            .get(&id)
            .map(|rows| rows.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn cleanup_outcomes_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        let mut deleted = 0;
        for rows in state.outcomes.values_mut() {
            let len = rows.len();
            rows.retain(|row| row.outcome.checked_at >= before);
            deleted += len - rows.len();
        }

        debug!("deleted {deleted} outcomes older than {before}");
        Ok(deleted)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;

        Ok(HealthStatus {
            healthy: !state.closed,
            message: if state.closed {
                "In-memory storage closed".to_string()
            } else {
                "In-memory storage operational".to_string()
            },
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let state = self.state.read().await;

        let outcomes: usize = state.outcomes.values().map(Vec::len).sum();
        Ok(format!(
            "In-Memory: {} targets, {} outcomes, {} owners",
            state.targets.len(),
            outcomes,
            state.owners.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend");
        self.state.write().await.closed = true;
        Ok(())
    }
}
