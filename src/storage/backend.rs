//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{NewTarget, OutcomeRow, OwnerScope, RecordedOutcome, TargetCache};
use crate::{ChatId, OwnerId, ProbeOutcome, Target, TargetId};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,
}

/// Trait for persistent storage backends
///
/// The store is the single source of truth for target configuration.
/// The scheduler re-reads targets from it on every tick and never keeps
/// its own copy of a target's interval or active flag.
///
/// ## Missing targets
///
/// Every mutation keyed by target id must tolerate the id no longer
/// existing: it returns `false` / `None` instead of an error. A probe may
/// finish after its target was deleted, and recording that probe must not
/// fail the tick.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared by every
/// scheduled job.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ========================================================================
    // Scheduling core
    // ========================================================================

    /// All targets with `active = true`, used to rebuild jobs at startup
    async fn list_active_targets(&self) -> StorageResult<Vec<Target>>;

    async fn get_target(&self, id: TargetId) -> StorageResult<Option<Target>>;

    /// Append one outcome to the target's history
    ///
    /// Returns `None` when the target does not exist.
    async fn append_outcome(&self, outcome: &ProbeOutcome) -> StorageResult<Option<OutcomeRow>>;

    /// Overwrite the cached "last probe" columns of a target
    async fn update_target_cache(&self, id: TargetId, cache: &TargetCache) -> StorageResult<bool>;

    /// Append the outcome and update the target cache in one atomic step
    ///
    /// Readers observe either both writes or neither. The cached
    /// availability being overwritten is returned alongside the new row;
    /// transitions are evaluated against it. Returns `None` (and writes nothing) when the target does not exist.
    async fn record_outcome(
        &self,
        outcome: &ProbeOutcome,
    ) -> StorageResult<Option<RecordedOutcome>>;

    // ========================================================================
    // Command layer
    // ========================================================================

    async fn upsert_owner(&self, owner_id: OwnerId, chat_id: ChatId) -> StorageResult<()>;

    async fn owner_chat(&self, owner_id: OwnerId) -> StorageResult<Option<ChatId>>;

    async fn add_target(&self, target: NewTarget) -> StorageResult<Target>;

    /// Targets of one owner, ordered by id
    async fn list_targets_by_owner(&self, owner_id: OwnerId) -> StorageResult<Vec<Target>>;

    /// Delete a target and its history
    async fn remove_target(&self, id: TargetId, owner: OwnerScope) -> StorageResult<bool>;

    async fn update_interval(
        &self,
        id: TargetId,
        interval_secs: u64,
        owner: OwnerScope,
    ) -> StorageResult<bool>;

    async fn set_active(&self, id: TargetId, active: bool, owner: OwnerScope)
    -> StorageResult<bool>;

    /// Most recent outcomes of a target, newest first
    async fn list_recent_outcomes(
        &self,
        id: TargetId,
        limit: usize,
    ) -> StorageResult<Vec<OutcomeRow>>;

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Delete outcomes older than the specified timestamp
    ///
    /// Returns the number of outcomes deleted.
    async fn cleanup_outcomes_before(&self, before: DateTime<Utc>) -> StorageResult<usize>;

    /// Performs a lightweight operation to verify the backend is operational
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable stats about the backend
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
