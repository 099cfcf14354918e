// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mirror row persistence.
//!
//! Owns the `mirror_rows` table in SQLite and the conditional upsert that
//! makes the sync minimal-diff: a row is rewritten only when the supplied
//! fingerprint differs from the stored one. The comparison lives in the
//! write's own `WHERE` clause, so an unchanged row is a true no-op - no
//! read-then-compare race, and `updated_at` does not advance.
//!
//! ```text
//! INSERT .. ON CONFLICT(id) DO UPDATE SET ..
//!     WHERE mirror_rows.row_hash <> excluded.row_hash
//! ```
//!
//! Rows are never deleted by this system; a row that disappears from the
//! source simply stops being updated.
//!
//! # SQLite Busy Handling
//!
//! SQLite can return SQLITE_BUSY/SQLITE_LOCKED when the database is
//! contended. We handle this with automatic retry and exponential backoff,
//! capped at a small number of attempts.

use crate::config::StoreConfig;
use crate::error::{MirrorError, Result};
use crate::record::Record;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for SQLite busy retry behavior
const SQLITE_RETRY_MAX_ATTEMPTS: u32 = 5;
const SQLITE_RETRY_BASE_DELAY_MS: u64 = 10;
const SQLITE_RETRY_MAX_DELAY_MS: u64 = 500;

/// Check if an error is a retryable SQLite busy/locked error
fn is_sqlite_busy_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: SQLITE_BUSY = 5, SQLITE_LOCKED = 6
            if let Some(code) = db_err.code() {
                return code == "5" || code == "6";
            }
            let msg = db_err.message().to_lowercase();
            msg.contains("database is locked") || msg.contains("database is busy")
        }
        _ => false,
    }
}

/// Execute a database operation with retry on SQLITE_BUSY/SQLITE_LOCKED
async fn execute_with_retry<F, Fut, T>(
    operation_name: &str,
    mut f: F,
) -> std::result::Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    let mut delay_ms = SQLITE_RETRY_BASE_DELAY_MS;

    loop {
        attempts += 1;
        match f().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts,
                        "SQLite operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if is_sqlite_busy_error(&e) && attempts < SQLITE_RETRY_MAX_ATTEMPTS => {
                warn!(
                    operation = operation_name,
                    attempts,
                    max_attempts = SQLITE_RETRY_MAX_ATTEMPTS,
                    delay_ms,
                    "SQLite busy, retrying"
                );
                crate::metrics::store_retries_total(operation_name);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(SQLITE_RETRY_MAX_DELAY_MS);
            }
            Err(e) => {
                if is_sqlite_busy_error(&e) {
                    warn!(
                        operation = operation_name,
                        attempts,
                        "SQLite busy, max retries exceeded"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Outcome of a conditional upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The row was inserted or its content replaced.
    Applied,
    /// The stored fingerprint matched; nothing was written.
    Unchanged,
}

/// One persisted mirror row.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRow {
    /// Record identifier (primary key).
    pub id: String,
    /// The mirrored record payload.
    pub record: Record,
    /// Fingerprint of the payload at last write.
    pub fingerprint: String,
    /// Last write time, epoch milliseconds.
    pub updated_at: i64,
}

/// Mirror store backed by SQLite.
pub struct MirrorStore {
    pool: SqlitePool,
    path: String,
    wal_mode: bool,
}

impl MirrorStore {
    /// Open (creating if missing) the mirror database.
    ///
    /// Does not create the table; call [`ensure_schema()`](Self::ensure_schema)
    /// once at startup.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        info!(path = %config.sqlite_path, "Opening mirror store");

        let in_memory = config.sqlite_path == ":memory:";
        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| MirrorError::Config(format!("Invalid SQLite options: {e}")))?
        } else {
            let mut opts =
                SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", config.sqlite_path))
                    .map_err(|e| MirrorError::Config(format!("Invalid SQLite path: {e}")))?
                    .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                    .create_if_missing(true);
            if config.wal_mode {
                opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
            }
            opts
        };

        // An in-memory database exists per connection; more than one
        // connection would see different tables.
        let max_connections = if in_memory { 1 } else { 2 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            path: config.sqlite_path.clone(),
            wal_mode: config.wal_mode && !in_memory,
        })
    }

    /// Create the mirror table if absent. Idempotent, safe on every start.
    pub async fn ensure_schema(&self) -> Result<()> {
        let pool = &self.pool;
        execute_with_retry("ensure_schema", || async {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS mirror_rows (
                    id TEXT PRIMARY KEY,
                    row_data TEXT NOT NULL,
                    row_hash TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )
                "#,
            )
            .execute(pool)
            .await
        })
        .await?;

        debug!("Mirror schema ensured");
        Ok(())
    }

    /// Insert or conditionally replace one mirror row.
    ///
    /// Inserts when `id` is unseen. When `id` exists, replaces payload,
    /// fingerprint, and `updated_at` only if the stored fingerprint differs
    /// from `fingerprint`; otherwise nothing is written and `updated_at`
    /// stays put.
    pub async fn upsert(
        &self,
        id: &str,
        record: &Record,
        fingerprint: &str,
    ) -> Result<UpsertOutcome> {
        let payload = serde_json::to_string(record)
            .map_err(|e| MirrorError::Internal(format!("record serialization failed: {e}")))?;
        let now = chrono::Utc::now().timestamp_millis();
        let pool = &self.pool;

        let result = execute_with_retry("upsert", || async {
            sqlx::query(
                r#"
                INSERT INTO mirror_rows (id, row_data, row_hash, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    row_data = excluded.row_data,
                    row_hash = excluded.row_hash,
                    updated_at = excluded.updated_at
                WHERE mirror_rows.row_hash <> excluded.row_hash
                "#,
            )
            .bind(id)
            .bind(&payload)
            .bind(fingerprint)
            .bind(now)
            .execute(pool)
            .await
        })
        .await?;

        if result.rows_affected() > 0 {
            Ok(UpsertOutcome::Applied)
        } else {
            Ok(UpsertOutcome::Unchanged)
        }
    }

    /// Fetch one row by id.
    pub async fn get(&self, id: &str) -> Result<Option<StoredRow>> {
        let row: Option<(String, String, String, i64)> = sqlx::query_as(
            "SELECT id, row_data, row_hash, updated_at FROM mirror_rows WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::decode_row).transpose()
    }

    /// Fetch all rows, ordered by id.
    pub async fn all(&self) -> Result<Vec<StoredRow>> {
        let rows: Vec<(String, String, String, i64)> =
            sqlx::query_as("SELECT id, row_data, row_hash, updated_at FROM mirror_rows ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Self::decode_row).collect()
    }

    /// Count of mirrored rows.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mirror_rows")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    fn decode_row((id, row_data, row_hash, updated_at): (String, String, String, i64)) -> Result<StoredRow> {
        let record: Record = serde_json::from_str(&row_data)
            .map_err(|e| MirrorError::Internal(format!("corrupt row_data for id {id}: {e}")))?;
        Ok(StoredRow {
            id,
            record,
            fingerprint: row_hash,
            updated_at,
        })
    }

    /// Database path (for diagnostics).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Force flush WAL to main database (for clean shutdown).
    pub async fn checkpoint(&self) -> Result<()> {
        let pool = &self.pool;
        execute_with_retry("checkpoint", || async {
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(pool)
                .await
        })
        .await?;

        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        if self.wal_mode {
            if let Err(e) = self.checkpoint().await {
                warn!(error = %e, "Failed to checkpoint WAL on close");
            }
        }
        self.pool.close().await;
        info!("Mirror store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    async fn open_store(dir: &tempfile::TempDir, name: &str) -> MirrorStore {
        let config = StoreConfig {
            sqlite_path: dir.path().join(name).to_string_lossy().to_string(),
            wal_mode: true,
        };
        let store = MirrorStore::connect(&config).await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_ensure_schema_idempotent() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir, "schema.db").await;
        // Second ensure must be a no-op, not an error
        store.ensure_schema().await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    async fn test_upsert_inserts_new_row() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir, "insert.db").await;

        let r = record(&[("id", json!("1")), ("name", json!("Alice"))]);
        let fp = fingerprint(&r);

        let outcome = store.upsert("1", &r, &fp).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Applied);

        let stored = store.get("1").await.unwrap().unwrap();
        assert_eq!(stored.id, "1");
        assert_eq!(stored.record, r);
        assert_eq!(stored.fingerprint, fp);
        assert!(stored.updated_at > 0);

        store.close().await;
    }

    #[tokio::test]
    async fn test_upsert_same_fingerprint_is_noop() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir, "noop.db").await;

        let r = record(&[("id", json!("42")), ("v", json!("a"))]);
        let fp = fingerprint(&r);

        store.upsert("42", &r, &fp).await.unwrap();
        let before = store.get("42").await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let outcome = store.upsert("42", &r, &fp).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged);

        let after = store.get("42").await.unwrap().unwrap();
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(after.fingerprint, before.fingerprint);
        assert_eq!(after.record, before.record);

        store.close().await;
    }

    #[tokio::test]
    async fn test_upsert_different_fingerprint_replaces() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir, "replace.db").await;

        let old = record(&[("id", json!("42")), ("v", json!("a"))]);
        store.upsert("42", &old, &fingerprint(&old)).await.unwrap();
        let before = store.get("42").await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let new = record(&[("id", json!("42")), ("v", json!("b"))]);
        let outcome = store.upsert("42", &new, &fingerprint(&new)).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Applied);

        let after = store.get("42").await.unwrap().unwrap();
        assert_eq!(after.record, new);
        assert_ne!(after.fingerprint, before.fingerprint);
        assert!(after.updated_at > before.updated_at);

        store.close().await;
    }

    #[tokio::test]
    async fn test_get_missing_row() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir, "missing.db").await;
        assert!(store.get("nope").await.unwrap().is_none());
        store.close().await;
    }

    #[tokio::test]
    async fn test_all_ordered_by_id() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir, "all.db").await;

        for id in ["c", "a", "b"] {
            let r = record(&[("id", json!(id))]);
            store.upsert(id, &r, &fingerprint(&r)).await.unwrap();
        }

        let rows = store.all().await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.count().await.unwrap(), 3);

        store.close().await;
    }

    #[tokio::test]
    async fn test_rows_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let r = record(&[("id", json!("1")), ("name", json!("Alice"))]);
        let fp = fingerprint(&r);

        {
            let store = open_store(&dir, "persist.db").await;
            store.upsert("1", &r, &fp).await.unwrap();
            store.close().await;
        }

        {
            let store = open_store(&dir, "persist.db").await;
            let stored = store.get("1").await.unwrap().unwrap();
            assert_eq!(stored.record, r);
            assert_eq!(stored.fingerprint, fp);
            store.close().await;
        }
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = MirrorStore::connect(&StoreConfig::in_memory()).await.unwrap();
        store.ensure_schema().await.unwrap();

        let r = record(&[("id", json!("1"))]);
        store.upsert("1", &r, &fingerprint(&r)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        store.close().await;
    }

    #[tokio::test]
    async fn test_execute_with_retry_succeeds_immediately() {
        let mut attempt_count = 0;

        let result: std::result::Result<i32, sqlx::Error> =
            execute_with_retry("test_op", || {
                attempt_count += 1;
                async { Ok(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempt_count, 1);
    }

    #[tokio::test]
    async fn test_execute_with_retry_fails_on_non_busy_error() {
        let mut attempt_count = 0;

        let result: std::result::Result<i32, sqlx::Error> =
            execute_with_retry("test_op", || {
                attempt_count += 1;
                async { Err(sqlx::Error::RowNotFound) }
            })
            .await;

        assert!(result.is_err());
        // Non-busy errors should not retry
        assert_eq!(attempt_count, 1);
    }

    #[test]
    fn test_is_sqlite_busy_error_row_not_found() {
        assert!(!is_sqlite_busy_error(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_is_sqlite_busy_error_pool_timed_out() {
        assert!(!is_sqlite_busy_error(&sqlx::Error::PoolTimedOut));
    }
}
