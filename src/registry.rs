//! SchedulerRegistry - reconciles the job table with the store
//!
//! Every runtime mutation goes through here: the store is written first,
//! then the scheduler actor is told to schedule, reschedule or cancel.
//! Mutations hold one lock across both steps, so a pause can never land
//! between a reschedule's active check and its schedule command.
//! Owner-scoped calls report targets of other owners as not found.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::actors::messages::{JobSnapshot, NotifierStats, SchedulerStats};
use crate::actors::{NotifierHandle, SchedulerHandle};
use crate::config::SchedulerConfig;
use crate::limiter::ConcurrencyLimiter;
use crate::notify::NotificationSink;
use crate::probe::Prober;
use crate::storage::{
    HealthStatus, NewTarget, OutcomeRow, OwnerScope, StorageBackend, StorageError,
};
use crate::{ChatId, MAX_INTERVAL_SECS, OwnerId, Target, TargetId};

/// Default number of history rows returned
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Errors returned by registry operations
#[derive(Debug)]
pub enum MonitorError {
    /// Interval must be between one second and one year
    InvalidInterval(u64),

    /// URL is not an absolute http(s) URL
    InvalidUrl(String),

    Storage(StorageError),

    /// The scheduler actor is no longer running
    Scheduler(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::InvalidInterval(secs) => {
                write!(
                    f,
                    "invalid interval {secs}s, must be between 1 and {MAX_INTERVAL_SECS} seconds"
                )
            }
            MonitorError::InvalidUrl(url) => write!(f, "invalid URL: {url}"),
            MonitorError::Storage(err) => write!(f, "storage error: {err}"),
            MonitorError::Scheduler(msg) => write!(f, "scheduler error: {msg}"),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for MonitorError {
    fn from(err: StorageError) -> Self {
        MonitorError::Storage(err)
    }
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        MonitorError::Scheduler(format!("{err:#}"))
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;

/// Counters from every part of the core
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub scheduler: Option<SchedulerStats>,
    pub notifier: Option<NotifierStats>,
    pub storage: String,
}

fn validate_interval(interval_secs: u64) -> MonitorResult<u64> {
    if !(1..=MAX_INTERVAL_SECS).contains(&interval_secs) {
        return Err(MonitorError::InvalidInterval(interval_secs));
    }
    Ok(interval_secs)
}

fn validate_url(url: &str) -> MonitorResult<String> {
    let url = url.trim();
    let parsed = reqwest::Url::parse(url).map_err(|_| MonitorError::InvalidUrl(url.to_string()))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(url.to_string()),
        _ => Err(MonitorError::InvalidUrl(url.to_string())),
    }
}

pub struct SchedulerRegistry {
    store: Arc<dyn StorageBackend>,
    scheduler: SchedulerHandle,
    notifier: NotifierHandle,
    default_interval: u64,

    /// Serializes store-then-scheduler mutations
    mutations: Mutex<()>,
}

impl SchedulerRegistry {
    /// Spawn the scheduler and notifier actors around `store`
    ///
    /// No job exists until `bootstrap` or `add_target` is called.
    pub fn start(
        settings: &SchedulerConfig,
        store: Arc<dyn StorageBackend>,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let notifier = NotifierHandle::spawn(store.clone(), sink);
        let scheduler = SchedulerHandle::spawn(
            store.clone(),
            prober,
            ConcurrencyLimiter::new(settings.max_concurrent_checks),
            notifier.transition_notifier(),
            settings.probe_timeout(),
        );

        Self {
            store,
            scheduler,
            notifier,
            default_interval: settings.default_interval.clamp(1, MAX_INTERVAL_SECS),
            mutations: Mutex::new(()),
        }
    }

    /// Schedule every active target in the store, returns how many
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> MonitorResult<usize> {
        let _mutation = self.mutations.lock().await;
        let targets = self.store.list_active_targets().await?;

        for target in &targets {
            self.scheduler
                .schedule_target(target.id, target.interval_secs)
                .await?;
        }

        info!("bootstrapped {} active targets", targets.len());
        Ok(targets.len())
    }

    pub async fn register_owner(&self, owner_id: OwnerId, chat_id: ChatId) -> MonitorResult<()> {
        self.store.upsert_owner(owner_id, chat_id).await?;
        debug!("registered chat {chat_id} for owner {owner_id}");
        Ok(())
    }

    /// Store a new target and schedule it
    #[instrument(skip(self))]
    pub async fn add_target(
        &self,
        owner_id: OwnerId,
        url: &str,
        interval_secs: Option<u64>,
    ) -> MonitorResult<Target> {
        let url = validate_url(url)?;
        let interval_secs = validate_interval(interval_secs.unwrap_or(self.default_interval))?;

        let _mutation = self.mutations.lock().await;
        let target = self
            .store
            .add_target(NewTarget {
                owner_id,
                url,
                interval_secs,
            })
            .await?;

        self.scheduler
            .schedule_target(target.id, target.interval_secs)
            .await?;

        info!("added target {} ({}) every {}s", target.id, target.url, interval_secs);
        Ok(target)
    }

    /// Delete a target with its history and cancel its job
    #[instrument(skip(self))]
    pub async fn remove_target(&self, owner: OwnerScope, id: TargetId) -> MonitorResult<bool> {
        let _mutation = self.mutations.lock().await;
        if !self.store.remove_target(id, owner).await? {
            return Ok(false);
        }

        self.scheduler.unschedule_target(id).await?;
        info!("removed target {id}");
        Ok(true)
    }

    /// Change the interval of a target, rescheduling it when active
    #[instrument(skip(self))]
    pub async fn set_interval(
        &self,
        owner: OwnerScope,
        id: TargetId,
        interval_secs: u64,
    ) -> MonitorResult<bool> {
        let interval_secs = validate_interval(interval_secs)?;

        let _mutation = self.mutations.lock().await;
        if !self.store.update_interval(id, interval_secs, owner).await? {
            return Ok(false);
        }

        match self.store.get_target(id).await? {
            Some(target) if target.active => {
                self.scheduler.schedule_target(id, interval_secs).await?;
            }
            Some(_) => debug!("target {id} is paused, interval stored only"),
            None => {
                warn!("target {id} vanished during interval update");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Deactivate a target and cancel its job
    #[instrument(skip(self))]
    pub async fn pause_target(&self, owner: OwnerScope, id: TargetId) -> MonitorResult<bool> {
        let _mutation = self.mutations.lock().await;
        if !self.store.set_active(id, false, owner).await? {
            return Ok(false);
        }

        self.scheduler.unschedule_target(id).await?;
        Ok(true)
    }

    /// Reactivate a target and schedule it with its stored interval
    #[instrument(skip(self))]
    pub async fn resume_target(&self, owner: OwnerScope, id: TargetId) -> MonitorResult<bool> {
        let _mutation = self.mutations.lock().await;
        if !self.store.set_active(id, true, owner).await? {
            return Ok(false);
        }

        let Some(target) = self.store.get_target(id).await? else {
            return Ok(false);
        };

        self.scheduler
            .schedule_target(id, target.interval_secs)
            .await?;
        Ok(true)
    }

    /// One target, `None` when missing or owned by someone else
    pub async fn target(&self, owner: OwnerScope, id: TargetId) -> MonitorResult<Option<Target>> {
        Ok(self
            .store
            .get_target(id)
            .await?
            .filter(|target| owner.is_none_or(|owner_id| owner_id == target.owner_id)))
    }

    pub async fn list_targets(&self, owner_id: OwnerId) -> MonitorResult<Vec<Target>> {
        Ok(self.store.list_targets_by_owner(owner_id).await?)
    }

    /// Most recent outcomes of an owner's target, `None` when not found
    pub async fn history(
        &self,
        owner: OwnerScope,
        id: TargetId,
        limit: usize,
    ) -> MonitorResult<Option<Vec<OutcomeRow>>> {
        if self.target(owner, id).await?.is_none() {
            return Ok(None);
        }

        Ok(Some(self.store.list_recent_outcomes(id, limit).await?))
    }

    pub async fn job_info(&self, id: TargetId) -> Option<JobSnapshot> {
        self.scheduler.job_info(id).await
    }

    pub async fn stats(&self) -> MonitorResult<RegistryStats> {
        Ok(RegistryStats {
            scheduler: self.scheduler.stats().await,
            notifier: self.notifier.stats().await,
            storage: self.store.get_stats().await?,
        })
    }

    pub async fn health(&self) -> MonitorResult<HealthStatus> {
        Ok(self.store.health_check().await?)
    }

    pub fn default_interval(&self) -> u64 {
        self.default_interval
    }

    /// Stop all jobs, flush pending notifications and close the store
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.notifier.shutdown().await;

        if let Err(e) = self.store.close().await {
            warn!("failed to close storage: {e}");
        }
        info!("scheduler registry stopped");
    }
}
