//! Helper types for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use site_monitor::config::SchedulerConfig;
use site_monitor::notify::NotificationSink;
use site_monitor::probe::{ProbeResult, Prober};
use site_monitor::registry::SchedulerRegistry;
use site_monitor::storage::{
    HealthStatus, MemoryBackend, NewTarget, OutcomeRow, OwnerScope, RecordedOutcome,
    StorageBackend, StorageError, StorageResult, TargetCache,
};
use site_monitor::transition::TransitionEvent;
use site_monitor::{ChatId, OwnerId, ProbeOutcome, Target, TargetId};

pub const OWNER: OwnerId = 1;
pub const CHAT: ChatId = 1001;

/// Prober returning scripted results, then 200s, optionally after a delay
#[derive(Default)]
pub struct ScriptedProber {
    script: Mutex<VecDeque<ProbeResult>>,
    delay: Duration,
    pub calls: AtomicUsize,
    current: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(script: Vec<ProbeResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _url: &str, _timeout: Duration) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.current.fetch_sub(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ProbeResult::response(200, 10, b"ok"))
    }
}

/// Sink remembering every delivered event
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<(ChatId, TransitionEvent)>>,
    pub fail: AtomicBool,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, chat_id: ChatId, event: &TransitionEvent) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("messaging API unavailable");
        }
        self.delivered.lock().unwrap().push((chat_id, event.clone()));
        Ok(())
    }
}

/// In-memory store whose reads or writes can be switched to fail
///
/// `read_delay_ms` delays every `get_target` answer after the read itself
/// happened, so callers act on a snapshot that may already be outdated.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryBackend,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub read_delay_ms: AtomicU64,
}

impl FlakyStore {
    fn check(&self, flag: &AtomicBool) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed("database is locked".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FlakyStore {
    async fn list_active_targets(&self) -> StorageResult<Vec<Target>> {
        self.inner.list_active_targets().await
    }

    async fn get_target(&self, id: TargetId) -> StorageResult<Option<Target>> {
        self.check(&self.fail_reads)?;
        let target = self.inner.get_target(id).await;

        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        target
    }

    async fn append_outcome(&self, outcome: &ProbeOutcome) -> StorageResult<Option<OutcomeRow>> {
        self.check(&self.fail_writes)?;
        self.inner.append_outcome(outcome).await
    }

    async fn update_target_cache(&self, id: TargetId, cache: &TargetCache) -> StorageResult<bool> {
        self.check(&self.fail_writes)?;
        self.inner.update_target_cache(id, cache).await
    }

    async fn record_outcome(
        &self,
        outcome: &ProbeOutcome,
    ) -> StorageResult<Option<RecordedOutcome>> {
        self.check(&self.fail_writes)?;
        self.inner.record_outcome(outcome).await
    }

    async fn upsert_owner(&self, owner_id: OwnerId, chat_id: ChatId) -> StorageResult<()> {
        self.inner.upsert_owner(owner_id, chat_id).await
    }

    async fn owner_chat(&self, owner_id: OwnerId) -> StorageResult<Option<ChatId>> {
        self.inner.owner_chat(owner_id).await
    }

    async fn add_target(&self, target: NewTarget) -> StorageResult<Target> {
        self.inner.add_target(target).await
    }

    async fn list_targets_by_owner(&self, owner_id: OwnerId) -> StorageResult<Vec<Target>> {
        self.inner.list_targets_by_owner(owner_id).await
    }

    async fn remove_target(&self, id: TargetId, owner: OwnerScope) -> StorageResult<bool> {
        self.inner.remove_target(id, owner).await
    }

    async fn update_interval(
        &self,
        id: TargetId,
        interval_secs: u64,
        owner: OwnerScope,
    ) -> StorageResult<bool> {
        self.inner.update_interval(id, interval_secs, owner).await
    }

    async fn set_active(
        &self,
        id: TargetId,
        active: bool,
        owner: OwnerScope,
    ) -> StorageResult<bool> {
        self.inner.set_active(id, active, owner).await
    }

    async fn list_recent_outcomes(
        &self,
        id: TargetId,
        limit: usize,
    ) -> StorageResult<Vec<OutcomeRow>> {
        self.inner.list_recent_outcomes(id, limit).await
    }

    async fn cleanup_outcomes_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        self.inner.cleanup_outcomes_before(before).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn get_stats(&self) -> StorageResult<String> {
        self.inner.get_stats().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

pub fn settings(max_concurrent_checks: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent_checks,
        ..Default::default()
    }
}

pub fn start_registry(
    store: Arc<dyn StorageBackend>,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn NotificationSink>,
    max_concurrent_checks: usize,
) -> SchedulerRegistry {
    SchedulerRegistry::start(&settings(max_concurrent_checks), store, prober, sink)
}

/// Let spawned actors run without moving a paused clock far
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
}
