//! Storage backends for targets, owners and probe history
//!
//! This module provides a trait-based abstraction over the persistent
//! store the scheduling core reconciles against.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` trait allows swapping implementations
//! - **Async**: All operations are async so scheduled jobs never block a worker
//! - **Source of truth**: target interval and active flag are re-read from
//!   the store on every tick
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database with WAL and migrations
//! - **In-Memory**: No persistence, for `backend = "none"` and tests
//!
//! ## Usage
//!
//! ```no_run
//! use site_monitor::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./data/monitor.db").await?;
//!     let active = backend.list_active_targets().await?;
//!     println!("{} active targets", active.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use schema::{NewTarget, OutcomeRow, Owner, OwnerScope, RecordedOutcome, TargetCache};

/// How often the retention task runs after its first pass
const RETENTION_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Delete history older than `retention_days` once now and then daily
///
/// The returned task runs until aborted. Cleanup failures are logged and
/// retried on the next period.
pub fn spawn_retention(store: Arc<dyn StorageBackend>, retention_days: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RETENTION_PERIOD);

        loop {
            ticker.tick().await;
            run_retention(store.as_ref(), retention_days).await;
        }
    })
}

#[instrument(skip(store))]
async fn run_retention(store: &dyn StorageBackend, retention_days: u32) {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));

    match store.cleanup_outcomes_before(cutoff).await {
        Ok(deleted) => info!("retention removed {deleted} outcomes older than {cutoff}"),
        Err(e) => error!("retention cleanup failed: {e}"),
    }
}
