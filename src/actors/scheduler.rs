//! TargetScheduler - one recurring job per active target
//!
//! The actor owns the job table and is the only place jobs are created or
//! cancelled. Each job is a spawned task that sleeps until its next fire
//! time, runs one tick and re-arms.
//!
//! ## Tick
//!
//! ```text
//! fire ──► previous probe still running? ──yes──► skip, re-arm
//!                     │
//!               re-read target ──┬─ missing / inactive ──► stop (report JobExit)
//!                                ├─ store error ─────────► re-arm with last interval
//!                                └─ active
//!                                      │
//!                   limiter permit ──► probe ──► release permit
//!                                      │
//!          record outcome ──► compare with the status it replaced ──► event
//!                                      │
//!                   re-arm with the interval just read
//! ```
//!
//! The in-flight flag is held from the re-read until the outcome is
//! recorded, so the cache a tick starts from is never older than the last
//! recorded probe of the same target.
//!
//! ## Replacement
//!
//! Scheduling an id that already has a job drops the old entry, which
//! drops its cancel sender. The old task stops at its next await point on
//! the timer; a tick it is currently running finishes but never re-arms.
//! The in-flight flag moves to the new job so the two never probe the same
//! target at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, instrument, trace};

use crate::TargetId;
use crate::limiter::ConcurrencyLimiter;
use crate::probe::Prober;
use crate::recorder::ResultRecorder;
use crate::storage::StorageBackend;
use crate::transition::TransitionNotifier;

use super::messages::{JobExit, JobSnapshot, SchedulerCommand, SchedulerStats};

/// What a job does after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickDecision {
    Rearm { interval_secs: u64 },
    Stop,
}

#[derive(Debug, Clone, Copy)]
struct JobTiming {
    interval_secs: u64,
    next_fire: Instant,
}

struct ScheduledJob {
    generation: u64,
    timing: watch::Receiver<JobTiming>,

    /// Dropping this cancels the job
    _cancel: oneshot::Sender<()>,

    /// Shared with any replacement of this job
    in_flight: Arc<AtomicBool>,

    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    probes: AtomicU64,
    skipped_in_flight: AtomicU64,
    read_failures: AtomicU64,
    record_failures: AtomicU64,
}

/// Everything a tick needs, shared by all jobs
struct TickContext {
    store: Arc<dyn StorageBackend>,
    prober: Arc<dyn Prober>,
    limiter: ConcurrencyLimiter,
    recorder: ResultRecorder,
    notifier: TransitionNotifier,
    probe_timeout: Duration,
    counters: Counters,
}

/// Clears the in-flight flag on every exit path of a probe
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TickContext {
    #[instrument(skip(self, in_flight))]
    async fn tick(
        &self,
        target_id: TargetId,
        last_interval: u64,
        in_flight: &AtomicBool,
    ) -> TickDecision {
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        if in_flight.swap(true, Ordering::SeqCst) {
            debug!("previous probe still running, skipping tick");
            self.counters.skipped_in_flight.fetch_add(1, Ordering::Relaxed);
            return TickDecision::Rearm {
                interval_secs: last_interval,
            };
        }
        let _guard = InFlightGuard(in_flight);

        let target = match self.store.get_target(target_id).await {
            Ok(Some(target)) if target.active => target,
            Ok(Some(_)) => {
                debug!("target is paused, stopping job");
                return TickDecision::Stop;
            }
            Ok(None) => {
                debug!("target no longer exists, stopping job");
                return TickDecision::Stop;
            }
            Err(e) => {
                error!("failed to read target before probing: {e}");
                self.counters.read_failures.fetch_add(1, Ordering::Relaxed);
                return TickDecision::Rearm {
                    interval_secs: last_interval,
                };
            }
        };

        let rearm = TickDecision::Rearm {
            interval_secs: target.interval_secs,
        };

        let result = {
            let Ok(_permit) = self.limiter.acquire().await else {
                debug!("limiter closed, stopping job");
                return TickDecision::Stop;
            };
            self.prober.probe(&target.url, self.probe_timeout).await
        };
        self.counters.probes.fetch_add(1, Ordering::Relaxed);

        let outcome = result.into_outcome(target.id, Utc::now());
        trace!(
            "probed {}: status={:?} latency={:?}ms",
            target.url, outcome.status_code, outcome.latency_ms
        );

        match self.recorder.record(&outcome).await {
            Ok(Some(recorded)) => {
                self.notifier.observe(&target, recorded.previous, &outcome);
                rearm
            }
            Ok(None) => TickDecision::Stop,
            Err(e) => {
                error!("failed to record outcome for {}: {e}", target.url);
                self.counters.record_failures.fetch_add(1, Ordering::Relaxed);
                rearm
            }
        }
    }
}

/// Longest single timer step, the same horizon tokio uses for "never"
const MAX_STEP: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `from` plus one interval, never overflowing
///
/// Only an instant already beyond any reachable `now` can fail to advance.
fn advance(from: Instant, interval_secs: u64) -> Instant {
    let step = Duration::from_secs(interval_secs.max(1)).min(MAX_STEP);
    from.checked_add(step).unwrap_or(from)
}

/// First fire time strictly after `now`, stepping from `from` by `interval`
fn next_fire_after(from: Instant, interval_secs: u64, now: Instant) -> Instant {
    let mut next = advance(from, interval_secs);
    while next <= now {
        next = advance(next, interval_secs);
    }
    next
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    ctx: Arc<TickContext>,
    target_id: TargetId,
    generation: u64,
    mut interval_secs: u64,
    timing: watch::Sender<JobTiming>,
    mut cancel: oneshot::Receiver<()>,
    in_flight: Arc<AtomicBool>,
    exit_tx: mpsc::UnboundedSender<JobExit>,
) {
    let mut next_fire = advance(Instant::now(), interval_secs);

    loop {
        timing.send_replace(JobTiming {
            interval_secs,
            next_fire,
        });

        tokio::select! {
            biased;

            _ = &mut cancel => {
                trace!("job {target_id}#{generation} cancelled");
                return;
            }

            _ = sleep_until(next_fire) => {}
        }

        match ctx.tick(target_id, interval_secs, &in_flight).await {
            TickDecision::Rearm {
                interval_secs: fresh,
            } => {
                interval_secs = fresh.max(1);
                next_fire = next_fire_after(next_fire, interval_secs, Instant::now());
            }
            TickDecision::Stop => {
                let _ = exit_tx.send(JobExit {
                    target_id,
                    generation,
                });
                return;
            }
        }
    }
}

/// Actor owning the job table
pub struct SchedulerActor {
    jobs: HashMap<TargetId, ScheduledJob>,
    next_generation: u64,
    ctx: Arc<TickContext>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
    exit_tx: mpsc::UnboundedSender<JobExit>,
    exit_rx: mpsc::UnboundedReceiver<JobExit>,
}

impl SchedulerActor {
    fn new(ctx: TickContext, command_rx: mpsc::Receiver<SchedulerCommand>) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        Self {
            jobs: HashMap::new(),
            next_generation: 0,
            ctx: Arc::new(ctx),
            command_rx,
            exit_tx,
            exit_rx,
        }
    }

    /// Run the actor's main loop
    ///
    /// This runs until a Shutdown command is received or every handle is
    /// dropped. Either way all jobs are cancelled before it returns.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting scheduler actor");

        loop {
            tokio::select! {
                Some(exit) = self.exit_rx.recv() => self.handle_job_exit(exit),

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("command channel closed, shutting down");
                        self.stop_all().await;
                        break;
                    };

                    match cmd {
                        SchedulerCommand::Schedule { target_id, interval_secs, respond_to } => {
                            let generation = self.schedule(target_id, interval_secs);
                            let _ = respond_to.send(generation);
                        }

                        SchedulerCommand::Unschedule { target_id, respond_to } => {
                            let existed = self.jobs.remove(&target_id).is_some();
                            if existed {
                                debug!("unscheduled target {target_id}");
                            }
                            let _ = respond_to.send(existed);
                        }

                        SchedulerCommand::JobInfo { target_id, respond_to } => {
                            let _ = respond_to.send(self.snapshot(target_id));
                        }

                        SchedulerCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats());
                        }

                        SchedulerCommand::Shutdown { respond_to } => {
                            debug!("received shutdown command");
                            self.stop_all().await;
                            let _ = respond_to.send(());
                            break;
                        }
                    }
                }
            }
        }

        debug!("scheduler actor stopped");
    }

    fn schedule(&mut self, target_id: TargetId, interval_secs: u64) -> u64 {
        let interval_secs = interval_secs.max(1);
        let generation = self.next_generation;
        self.next_generation += 1;

        let in_flight = self
            .jobs
            .remove(&target_id)
            .map(|old| old.in_flight)
            .unwrap_or_default();

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (timing_tx, timing_rx) = watch::channel(JobTiming {
            interval_secs,
            next_fire: advance(Instant::now(), interval_secs),
        });

        let handle = tokio::spawn(run_job(
            self.ctx.clone(),
            target_id,
            generation,
            interval_secs,
            timing_tx,
            cancel_rx,
            in_flight.clone(),
            self.exit_tx.clone(),
        ));

        self.jobs.insert(
            target_id,
            ScheduledJob {
                generation,
                timing: timing_rx,
                _cancel: cancel_tx,
                in_flight,
                handle,
            },
        );

        debug!("scheduled target {target_id} every {interval_secs}s (generation {generation})");
        generation
    }

    fn handle_job_exit(&mut self, exit: JobExit) {
        let current = self.jobs.get(&exit.target_id).map(|job| job.generation);

        if current == Some(exit.generation) {
            self.jobs.remove(&exit.target_id);
            debug!("job for target {} stopped on its own", exit.target_id);
        } else {
            trace!("ignoring exit of replaced job {}#{}", exit.target_id, exit.generation);
        }
    }

    fn snapshot(&self, target_id: TargetId) -> Option<JobSnapshot> {
        let job = self.jobs.get(&target_id)?;
        let timing = *job.timing.borrow();

        Some(JobSnapshot {
            target_id,
            interval_secs: timing.interval_secs,
            next_fire_in_ms: timing
                .next_fire
                .saturating_duration_since(Instant::now())
                .as_millis() as u64,
            generation: job.generation,
        })
    }

    fn stats(&self) -> SchedulerStats {
        let counters = &self.ctx.counters;

        SchedulerStats {
            jobs: self.jobs.len(),
            ticks: counters.ticks.load(Ordering::Relaxed),
            probes: counters.probes.load(Ordering::Relaxed),
            skipped_in_flight: counters.skipped_in_flight.load(Ordering::Relaxed),
            read_failures: counters.read_failures.load(Ordering::Relaxed),
            record_failures: counters.record_failures.load(Ordering::Relaxed),
            limiter_capacity: self.ctx.limiter.capacity(),
            limiter_in_flight: self.ctx.limiter.in_flight(),
            limiter_peak: self.ctx.limiter.peak(),
        }
    }

    /// Cancel every job and wait for ticks that are already running
    async fn stop_all(&mut self) {
        // probes still waiting for a permit give up immediately
        self.ctx.limiter.close();

        let handles: Vec<_> = self.jobs.drain().map(|(_, job)| job.handle).collect();
        info!("stopping {} scheduled jobs", handles.len());

        futures::future::join_all(handles).await;
    }
}

/// Handle for controlling the scheduler actor
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn the scheduler actor
    ///
    /// # Arguments
    /// - `store`: source of truth re-read on every tick
    /// - `prober`: executes the probes
    /// - `limiter`: global gate shared by all jobs
    /// - `notifier`: receives every recorded outcome for transition detection
    /// - `probe_timeout`: per-probe timeout, independent of the interval
    pub fn spawn(
        store: Arc<dyn StorageBackend>,
        prober: Arc<dyn Prober>,
        limiter: ConcurrencyLimiter,
        notifier: TransitionNotifier,
        probe_timeout: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        let ctx = TickContext {
            recorder: ResultRecorder::new(store.clone()),
            store,
            prober,
            limiter,
            notifier,
            probe_timeout,
            counters: Counters::default(),
        };

        tokio::spawn(SchedulerActor::new(ctx, cmd_rx).run());

        Self { sender: cmd_tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| anyhow!("scheduler is not running"))?;

        rx.await.map_err(|_| anyhow!("scheduler dropped the request"))
    }

    /// Install or replace the job of a target, returns its generation
    pub async fn schedule_target(&self, target_id: TargetId, interval_secs: u64) -> Result<u64> {
        self.request(|respond_to| SchedulerCommand::Schedule {
            target_id,
            interval_secs,
            respond_to,
        })
        .await
    }

    /// Cancel the job of a target, returns whether one existed
    pub async fn unschedule_target(&self, target_id: TargetId) -> Result<bool> {
        self.request(|respond_to| SchedulerCommand::Unschedule {
            target_id,
            respond_to,
        })
        .await
    }

    pub async fn job_info(&self, target_id: TargetId) -> Option<JobSnapshot> {
        self.request(|respond_to| SchedulerCommand::JobInfo {
            target_id,
            respond_to,
        })
        .await
        .ok()
        .flatten()
    }

    pub async fn stats(&self) -> Option<SchedulerStats> {
        self.request(|respond_to| SchedulerCommand::GetStats { respond_to })
            .await
            .ok()
    }

    /// Number of live jobs
    pub async fn job_count(&self) -> usize {
        self.stats().await.map(|s| s.jobs).unwrap_or_default()
    }

    /// Cancel all jobs and wait for in-flight ticks to finish
    pub async fn shutdown(&self) {
        if self
            .request(|respond_to| SchedulerCommand::Shutdown { respond_to })
            .await
            .is_err()
        {
            debug!("scheduler already stopped");
        }
    }
}
