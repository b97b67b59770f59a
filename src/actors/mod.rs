//! Actor-based scheduling core
//!
//! Each actor runs as an independent async task communicating via Tokio
//! channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!              ┌────────────────────┐
//!              │ SchedulerRegistry  │  bootstrap, add/remove/reschedule
//!              └─────────┬──────────┘
//!                        │ commands (mpsc + oneshot)
//!              ┌─────────▼──────────┐
//!              │  SchedulerActor    │  owns the job table
//!              └─────────┬──────────┘
//!                        │ spawns / cancels
//!        ┌───────────────┼───────────────┐
//!  ┌─────▼─────┐   ┌─────▼─────┐   ┌─────▼─────┐
//!  │  job  #1  │   │  job  #2  │   │  job  #N  │  one per active target
//!  └─────┬─────┘   └─────┬─────┘   └─────┬─────┘
//!        └───── ConcurrencyLimiter ──────┘
//!                        │ transition events (unbounded mpsc)
//!              ┌─────────▼──────────┐
//!              │   NotifierActor    │  NotificationSink
//!              └────────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels for synchronous queries
//! 3. **Events**: jobs push transition events without waiting on delivery

pub mod messages;
pub mod notifier;
pub mod scheduler;

pub use notifier::NotifierHandle;
pub use scheduler::SchedulerHandle;
