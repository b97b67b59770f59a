//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to a specific actor via mpsc
//! 2. **Replies**: oneshot channels carried inside the command
//! 3. **Job exits**: scheduled jobs never touch the job table, they report
//!    back to the scheduler actor instead

use serde::Serialize;
use tokio::sync::oneshot;

use crate::TargetId;

/// Commands that can be sent to the TargetScheduler actor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Install or replace the recurring job of a target
    ///
    /// Replies with the generation number of the new job.
    Schedule {
        target_id: TargetId,
        interval_secs: u64,
        respond_to: oneshot::Sender<u64>,
    },

    /// Cancel a target's job
    ///
    /// A tick already in flight completes but does not re-arm. Replies
    /// whether a job existed.
    Unschedule {
        target_id: TargetId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Timing of one target's job
    JobInfo {
        target_id: TargetId,
        respond_to: oneshot::Sender<Option<JobSnapshot>>,
    },

    /// Scheduler and limiter counters
    GetStats {
        respond_to: oneshot::Sender<SchedulerStats>,
    },

    /// Cancel every job, wait for in-flight ticks and stop
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Sent by a job task when it stops on its own (target gone or paused)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobExit {
    pub target_id: TargetId,

    /// Generation of the exiting job, so a stale exit cannot remove its replacement
    pub generation: u64,
}

/// Point-in-time view of a scheduled job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub target_id: TargetId,

    /// Interval the job is currently armed with
    pub interval_secs: u64,

    /// Time until the next fire, zero while a tick is running late
    pub next_fire_in_ms: u64,

    pub generation: u64,
}

/// Counters exposed by the scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Live jobs in the table
    pub jobs: usize,

    pub ticks: u64,
    pub probes: u64,

    /// Ticks skipped because the previous probe of the same target was still running
    pub skipped_in_flight: u64,

    /// Ticks whose target could not be read from the store
    pub read_failures: u64,

    /// Outcomes dropped because the store rejected them
    pub record_failures: u64,

    pub limiter_capacity: usize,
    pub limiter_in_flight: usize,
    pub limiter_peak: usize,
}

/// Commands that can be sent to the notifier actor
#[derive(Debug)]
pub enum NotifierCommand {
    GetStats {
        respond_to: oneshot::Sender<NotifierStats>,
    },

    /// Deliver whatever is queued, then stop
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Delivery counters of the notifier actor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifierStats {
    pub delivered: u64,
    pub failed: u64,

    /// Events whose owner has no registered chat
    pub skipped: u64,
}
