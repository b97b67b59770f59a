//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `StorageBackend` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers are not blocked while a tick records its outcome
//! - **Connection pooling**: Shared by every scheduled job
//! - **Migrations**: Automatic schema versioning with sqlx
//! - **Foreign keys**: Deleting a target cascades to its history
//!
//! ## Atomic recording
//!
//! `record_outcome` inserts the history row, reads the cache it is about
//! to replace and updates it, all inside one transaction. The guarded
//! `INSERT` runs first so the write lock is held before the cache is read:
//! when it inserts nothing the target is gone, the transaction is rolled
//! back and the outcome is discarded.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{
    NewTarget, OutcomeRow, OwnerScope, RecordedOutcome, TargetCache, millis_to_timestamp,
    timestamp_to_millis,
};
use crate::{ChatId, OwnerId, ProbeOutcome, Target, TargetId, cached_availability};

const TARGET_COLUMNS: &str = r#"
    id, owner_id, url, interval_secs, active,
    last_status_code, last_latency_ms, last_fingerprint, last_checked_at, created_at
"#;

const OUTCOME_COLUMNS: &str = r#"
    id, target_id, checked_at, status_code, latency_ms, reachable, fingerprint, error
"#;

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file (and its directory) if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for concurrent access (WAL mode, busy timeout)
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use site_monitor::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./data/monitor.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path = db_path.as_ref();
        let db_path_str = db_path.to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn target_from_row(row: &SqliteRow) -> StorageResult<Target> {
        Ok(Target {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            url: row.try_get("url")?,
            interval_secs: row.try_get::<i64, _>("interval_secs")? as u64,
            active: row.try_get("active")?,
            last_status_code: row
                .try_get::<Option<i64>, _>("last_status_code")?
                .map(|v| v as u16),
            last_latency_ms: row
                .try_get::<Option<i64>, _>("last_latency_ms")?
                .map(|v| v as u64),
            last_fingerprint: row.try_get("last_fingerprint")?,
            last_checked_at: row
                .try_get::<Option<i64>, _>("last_checked_at")?
                .map(millis_to_timestamp),
            created_at: millis_to_timestamp(row.try_get("created_at")?),
        })
    }

    fn outcome_from_row(row: &SqliteRow) -> StorageResult<OutcomeRow> {
        Ok(OutcomeRow {
            id: row.try_get("id")?,
            outcome: ProbeOutcome {
                target_id: row.try_get("target_id")?,
                checked_at: millis_to_timestamp(row.try_get("checked_at")?),
                status_code: row
                    .try_get::<Option<i64>, _>("status_code")?
                    .map(|v| v as u16),
                latency_ms: row
                    .try_get::<Option<i64>, _>("latency_ms")?
                    .map(|v| v as u64),
                reachable: row.try_get("reachable")?,
                fingerprint: row.try_get("fingerprint")?,
                error: row.try_get("error")?,
            },
        })
    }

    async fn fetch_targets(
        &self,
        filter: &str,
        bind: Option<i64>,
    ) -> StorageResult<Vec<Target>> {
        let sql = format!("SELECT {TARGET_COLUMNS} FROM targets {filter} ORDER BY id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::target_from_row).collect()
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn list_active_targets(&self) -> StorageResult<Vec<Target>> {
        let targets = self.fetch_targets("WHERE active = 1", None).await?;
        debug!("loaded {} active targets", targets.len());
        Ok(targets)
    }

    #[instrument(skip(self))]
    async fn get_target(&self, id: TargetId) -> StorageResult<Option<Target>> {
        let sql = format!("SELECT {TARGET_COLUMNS} FROM targets WHERE id = ?");

        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(Self::target_from_row)
            .transpose()
    }

    #[instrument(skip(self, outcome), fields(target_id = outcome.target_id))]
    async fn append_outcome(&self, outcome: &ProbeOutcome) -> StorageResult<Option<OutcomeRow>> {
        let result = sqlx::query(
            r#"
            INSERT INTO outcomes (
                target_id, checked_at, status_code, latency_ms, reachable, fingerprint, error
            )
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM targets WHERE id = ?)
            "#,
        )
        .bind(outcome.target_id)
        .bind(timestamp_to_millis(&outcome.checked_at))
        .bind(outcome.status_code.map(i64::from))
        .bind(outcome.latency_ms.map(|v| v as i64))
        .bind(outcome.reachable)
        .bind(&outcome.fingerprint)
        .bind(&outcome.error)
        .bind(outcome.target_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(OutcomeRow {
            id: result.last_insert_rowid(),
            outcome: outcome.clone(),
        }))
    }

    #[instrument(skip(self, cache))]
    async fn update_target_cache(&self, id: TargetId, cache: &TargetCache) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE targets SET
                last_status_code = ?,
                last_latency_ms = ?,
                last_fingerprint = ?,
                last_checked_at = ?
            WHERE id = ?
            "#,
        )
        .bind(cache.status_code.map(i64::from))
        .bind(cache.latency_ms.map(|v| v as i64))
        .bind(&cache.fingerprint)
        .bind(timestamp_to_millis(&cache.checked_at))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, outcome), fields(target_id = outcome.target_id))]
    async fn record_outcome(
        &self,
        outcome: &ProbeOutcome,
    ) -> StorageResult<Option<RecordedOutcome>> {
        let cache = TargetCache::from(outcome);
        let checked_at = timestamp_to_millis(&outcome.checked_at);

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO outcomes (
                target_id, checked_at, status_code, latency_ms, reachable, fingerprint, error
            )
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM targets WHERE id = ?)
            "#,
        )
        .bind(outcome.target_id)
        .bind(checked_at)
        .bind(outcome.status_code.map(i64::from))
        .bind(outcome.latency_ms.map(|v| v as i64))
        .bind(outcome.reachable)
        .bind(&outcome.fingerprint)
        .bind(&outcome.error)
        .bind(outcome.target_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            debug!("target gone, outcome discarded");
            return Ok(None);
        }

        let (last_status_code, last_checked_at): (Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT last_status_code, last_checked_at FROM targets WHERE id = ?",
        )
        .bind(outcome.target_id)
        .fetch_one(&mut *tx)
        .await?;

        let previous = cached_availability(
            last_status_code.and_then(|code| u16::try_from(code).ok()),
            last_checked_at.map(millis_to_timestamp),
        );

        sqlx::query(
            r#"
            UPDATE targets SET
                last_status_code = ?,
                last_latency_ms = ?,
                last_fingerprint = ?,
                last_checked_at = ?
            WHERE id = ?
            "#,
        )
        .bind(cache.status_code.map(i64::from))
        .bind(cache.latency_ms.map(|v| v as i64))
        .bind(&cache.fingerprint)
        .bind(checked_at)
        .bind(outcome.target_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(RecordedOutcome {
            row: OutcomeRow {
                id: inserted.last_insert_rowid(),
                outcome: outcome.clone(),
            },
            previous,
        }))
    }

    #[instrument(skip(self))]
    async fn upsert_owner(&self, owner_id: OwnerId, chat_id: ChatId) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO owners (id, chat_id) VALUES (?, ?)
            ON CONFLICT (id) DO UPDATE SET chat_id = excluded.chat_id
            "#,
        )
        .bind(owner_id)
        .bind(chat_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn owner_chat(&self, owner_id: OwnerId) -> StorageResult<Option<ChatId>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT chat_id FROM owners WHERE id = ?")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0))
    }

    #[instrument(skip(self, target), fields(owner_id = target.owner_id))]
    async fn add_target(&self, target: NewTarget) -> StorageResult<Target> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO targets (owner_id, url, interval_secs, active, created_at)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(target.owner_id)
        .bind(&target.url)
        .bind(target.interval_secs as i64)
        .bind(timestamp_to_millis(&created_at))
        .execute(&self.pool)
        .await?;

        // read back so the returned timestamp matches the stored precision
        let id = result.last_insert_rowid();
        self.get_target(id)
            .await?
            .ok_or_else(|| StorageError::QueryFailed(format!("target {id} vanished after insert")))
    }

    async fn list_targets_by_owner(&self, owner_id: OwnerId) -> StorageResult<Vec<Target>> {
        self.fetch_targets("WHERE owner_id = ?", Some(owner_id))
            .await
    }

    #[instrument(skip(self))]
    async fn remove_target(&self, id: TargetId, owner: OwnerScope) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM targets WHERE id = ? AND (? IS NULL OR owner_id = ?)")
            .bind(id)
            .bind(owner)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn update_interval(
        &self,
        id: TargetId,
        interval_secs: u64,
        owner: OwnerScope,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE targets SET interval_secs = ? WHERE id = ? AND (? IS NULL OR owner_id = ?)",
        )
        .bind(interval_secs as i64)
        .bind(id)
        .bind(owner)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn set_active(
        &self,
        id: TargetId,
        active: bool,
        owner: OwnerScope,
    ) -> StorageResult<bool> {
        let result =
            sqlx::query("UPDATE targets SET active = ? WHERE id = ? AND (? IS NULL OR owner_id = ?)")
                .bind(active)
                .bind(id)
                .bind(owner)
                .bind(owner)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_recent_outcomes(
        &self,
        id: TargetId,
        limit: usize,
    ) -> StorageResult<Vec<OutcomeRow>> {
        let sql = format!(
            r#"
            SELECT {OUTCOME_COLUMNS}
            FROM outcomes
            WHERE target_id = ?
            ORDER BY checked_at DESC, id DESC
            LIMIT ?
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::outcome_from_row).collect()
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_outcomes_before(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        info!("cleaning up outcomes older than {}", before);

        let result = sqlx::query("DELETE FROM outcomes WHERE checked_at < ?")
            .bind(timestamp_to_millis(&before))
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() as usize;
        info!("deleted {} old outcomes", deleted);

        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: format!("SQLite backend operational ({})", self.db_path),
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let targets: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM targets")
            .fetch_one(&self.pool)
            .await?;

        let outcomes: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outcomes")
            .fetch_one(&self.pool)
            .await?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        let file_size_mb = file_size as f64 / 1_000_000.0;

        Ok(format!(
            "SQLite: {} targets, {} outcomes, {:.2} MB on disk",
            targets.0, outcomes.0, file_size_mb
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
