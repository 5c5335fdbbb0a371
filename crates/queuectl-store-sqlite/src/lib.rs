//! SQLite implementation of the queuectl job queue.
//!
//! This crate provides the single production [`JobStore`] implementation,
//! backed by one `queue.db` file shared by every worker process on the
//! host.
//!
//! # Features
//!
//! - Single-writer serializable claims via `BEGIN IMMEDIATE`
//! - Exponential backoff retry logic (delegated to `queuectl_core::policy`)
//! - Dead letter queue for permanently failed jobs
//! - Orphan recovery for jobs abandoned by a crashed worker
//!
//! # Database schema
//!
//! ```sql
//! CREATE TABLE jobs(
//!   id TEXT PRIMARY KEY,
//!   command TEXT NOT NULL,
//!   state TEXT NOT NULL,
//!   attempts INTEGER NOT NULL,
//!   max_retries INTEGER NOT NULL,
//!   created_at TEXT NOT NULL,
//!   updated_at TEXT NOT NULL,
//!   next_run_at TEXT NOT NULL,
//!   last_error TEXT,
//!   priority INTEGER NOT NULL DEFAULT 0,
//!   worker_id TEXT
//! );
//! CREATE INDEX idx_jobs_state_next ON jobs(state, next_run_at);
//!
//! CREATE TABLE config(key TEXT PRIMARY KEY, value TEXT NOT NULL);
//!
//! CREATE TABLE workers(
//!   id TEXT PRIMARY KEY,
//!   pid INTEGER NOT NULL,
//!   started_at TEXT NOT NULL,
//!   stopped_at TEXT
//! );
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use queuectl_store_sqlite::SqliteStore;
//!
//! let store = SqliteStore::open("/home/me/.queuectl/queue.db").await?;
//! ```

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queuectl_core::error::{Error, Result};
use queuectl_core::job::{Job, JobState};
use queuectl_core::worker_record::WorkerRecord;
use queuectl_core::JobStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor as _, Row, SqlitePool};

/// SQLite-backed job store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if absent) the single-file store at `path`, run
    /// schema migrations, and seed default config rows.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))
            .map_err(Error::Store)?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(opts)
            .await
            .map_err(Error::Store)?;

        let store = SqliteStore { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store, for tests. Each call creates an isolated
    /// database — callers must keep the returned pool alive for the
    /// database's lifetime.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(Error::Store)?;
        let store = SqliteStore { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs(
              id TEXT PRIMARY KEY,
              command TEXT NOT NULL,
              state TEXT NOT NULL,
              attempts INTEGER NOT NULL,
              max_retries INTEGER NOT NULL,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              next_run_at TEXT NOT NULL,
              last_error TEXT,
              priority INTEGER NOT NULL DEFAULT 0,
              worker_id TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(Error::Store)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_state_next ON jobs(state, next_run_at)")
            .execute(&self.pool)
            .await
            .map_err(Error::Store)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS config(key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        )
        .execute(&self.pool)
        .await
        .map_err(Error::Store)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workers(
              id TEXT PRIMARY KEY,
              pid INTEGER NOT NULL,
              started_at TEXT NOT NULL,
              stopped_at TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(Error::Store)?;

        for (key, value) in queuectl_core::config::defaults() {
            sqlx::query(
                "INSERT INTO config(key, value) VALUES (?, ?) ON CONFLICT(key) DO NOTHING",
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(Error::Store)?;
        }

        Ok(())
    }

    /// Access to the underlying pool, for diagnostics and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job> {
    let state_str: String = row.try_get("state").map_err(Error::Store)?;
    let state = JobState::from_str(&state_str)
        .map_err(|e| Error::Store(sqlx::Error::Decode(Box::new(e))))?;

    Ok(Job {
        id: row.try_get("id").map_err(Error::Store)?,
        command: row.try_get("command").map_err(Error::Store)?,
        state,
        attempts: row.try_get::<i64, _>("attempts").map_err(Error::Store)? as u32,
        max_retries: row.try_get::<i64, _>("max_retries").map_err(Error::Store)? as u32,
        priority: row.try_get("priority").map_err(Error::Store)?,
        next_run_at: parse_ts(row, "next_run_at")?,
        created_at: parse_ts(row, "created_at")?,
        updated_at: parse_ts(row, "updated_at")?,
        last_error: row.try_get("last_error").map_err(Error::Store)?,
        worker_id: row.try_get("worker_id").map_err(Error::Store)?,
    })
}

fn parse_ts(row: &sqlx::sqlite::SqliteRow, col: &'static str) -> Result<DateTime<Utc>> {
    let s: String = row.try_get(col).map_err(Error::Store)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Store(sqlx::Error::Decode(Box::new(e))))
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn upsert_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs(
                id, command, state, attempts, max_retries,
                created_at, updated_at, next_run_at, last_error, priority, worker_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                command = excluded.command,
                state = excluded.state,
                attempts = excluded.attempts,
                max_retries = excluded.max_retries,
                updated_at = excluded.updated_at,
                next_run_at = excluded.next_run_at,
                last_error = excluded.last_error,
                priority = excluded.priority,
                worker_id = excluded.worker_id
            "#,
        )
        .bind(&job.id)
        .bind(&job.command)
        .bind(job.state.to_string())
        .bind(job.attempts as i64)
        .bind(job.max_retries as i64)
        .bind(fmt_ts(job.created_at))
        .bind(fmt_ts(job.updated_at))
        .bind(fmt_ts(job.next_run_at))
        .bind(&job.last_error)
        .bind(job.priority)
        .bind(&job.worker_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Store)?;

        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Store)?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<Job>> {
        let rows = match state {
            Some(s) => {
                sqlx::query("SELECT * FROM jobs WHERE state = ? ORDER BY created_at ASC")
                    .bind(s.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM jobs ORDER BY created_at ASC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(Error::Store)?;

        rows.iter().map(row_to_job).collect()
    }

    async fn counts_by_state(&self) -> Result<Vec<(JobState, i64)>> {
        let rows = sqlx::query("SELECT state, COUNT(*) as c FROM jobs GROUP BY state")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Store)?;

        rows.into_iter()
            .map(|row| {
                let state_str: String = row.try_get("state").map_err(Error::Store)?;
                let state = JobState::from_str(&state_str)
                    .map_err(|e| Error::Store(sqlx::Error::Decode(Box::new(e))))?;
                let count: i64 = row.try_get("c").map_err(Error::Store)?;
                Ok((state, count))
            })
            .collect()
    }

    async fn config_get(&self, key: &str, default: &str) -> Result<String> {
        let row = sqlx::query("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Store)?;

        match row {
            Some(r) => r.try_get("value").map_err(Error::Store),
            None => Ok(default.to_string()),
        }
    }

    async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO config(key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(Error::Store)?;

        Ok(())
    }

    async fn register_worker(&self, id: &str, pid: i64) -> Result<()> {
        sqlx::query("INSERT INTO workers(id, pid, started_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(pid)
            .bind(fmt_ts(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(Error::Store)?;

        Ok(())
    }

    async fn stop_worker_record(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE workers SET stopped_at = ? WHERE id = ?")
            .bind(fmt_ts(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Store)?;

        Ok(())
    }

    async fn list_active_workers(&self) -> Result<Vec<WorkerRecord>> {
        let rows = sqlx::query("SELECT * FROM workers WHERE stopped_at IS NULL")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Store)?;

        rows.into_iter()
            .map(|row| {
                Ok(WorkerRecord {
                    id: row.try_get("id").map_err(Error::Store)?,
                    pid: row.try_get("pid").map_err(Error::Store)?,
                    started_at: parse_ts(&row, "started_at")?,
                    stopped_at: row
                        .try_get::<Option<String>, _>("stopped_at")
                        .map_err(Error::Store)?
                        .map(|s| {
                            DateTime::parse_from_rfc3339(&s)
                                .map(|dt| dt.with_timezone(&Utc))
                                .map_err(|e| Error::Store(sqlx::Error::Decode(Box::new(e))))
                        })
                        .transpose()?,
                })
            })
            .collect()
    }

    async fn recover_processing(&self) -> Result<u64> {
        let now = fmt_ts(Utc::now());
        let result = sqlx::query(
            r#"
            UPDATE jobs
               SET state = 'failed', next_run_at = ?, worker_id = NULL, updated_at = ?
             WHERE state = 'processing'
            "#,
        )
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(Error::Store)?;

        Ok(result.rows_affected())
    }

    /// `BEGIN IMMEDIATE` acquires SQLite's write lock before the
    /// candidate row is even selected, so two workers racing this
    /// method serialize on the lock: the loser observes the winner's
    /// update once it proceeds, and the ready set has already shrunk by
    /// one.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<Job>> {
        let mut conn = self.pool.acquire().await.map_err(Error::Store)?;

        conn.execute("BEGIN IMMEDIATE").await.map_err(|e| {
            if is_busy(&e) {
                Error::Busy
            } else {
                Error::Store(e)
            }
        })?;

        // Any error past this point must roll back before returning, so a
        // connection with an open transaction is never handed back to the
        // pool for the next `acquire` to inherit.
        match select_and_claim(&mut conn, worker_id).await {
            Ok(row) => {
                conn.execute("COMMIT").await.map_err(Error::Store)?;
                row.as_ref().map(row_to_job).transpose()
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK").await;
                Err(e)
            }
        }
    }

    async fn mark_completed(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET state = 'completed', updated_at = ?, worker_id = NULL, last_error = NULL WHERE id = ?",
        )
        .bind(fmt_ts(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Store)?;

        Ok(())
    }

    async fn mark_failed_or_dead(
        &self,
        id: &str,
        attempts: u32,
        max_retries: u32,
        last_error: Option<&str>,
        next_run_at: DateTime<Utc>,
    ) -> Result<()> {
        let now = fmt_ts(Utc::now());

        if queuectl_core::policy::is_dead(attempts, max_retries) {
            sqlx::query(
                "UPDATE jobs SET state = 'dead', attempts = ?, last_error = ?, updated_at = ?, worker_id = NULL WHERE id = ?",
            )
            .bind(attempts as i64)
            .bind(last_error)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Store)?;
        } else {
            sqlx::query(
                "UPDATE jobs SET state = 'failed', attempts = ?, last_error = ?, next_run_at = ?, updated_at = ?, worker_id = NULL WHERE id = ?",
            )
            .bind(attempts as i64)
            .bind(last_error)
            .bind(fmt_ts(next_run_at))
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Store)?;
        }

        Ok(())
    }
}

fn is_busy(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.message().contains("database is locked") || e.message().contains("busy"))
}

/// The select-then-update half of the claim protocol, run inside the
/// caller's already-open `BEGIN IMMEDIATE` transaction. Returns the
/// claimed row, or `None` if nothing was ready. Never commits or rolls
/// back itself — that is the caller's responsibility.
async fn select_and_claim(
    conn: &mut sqlx::pool::PoolConnection<sqlx::Sqlite>,
    worker_id: &str,
) -> Result<Option<sqlx::sqlite::SqliteRow>> {
    let now = fmt_ts(Utc::now());
    let candidate = sqlx::query(
        r#"
        SELECT id FROM jobs
         WHERE state IN ('pending', 'failed') AND next_run_at <= ?
         ORDER BY priority DESC, next_run_at ASC, created_at ASC
         LIMIT 1
        "#,
    )
    .bind(&now)
    .fetch_optional(&mut **conn)
    .await
    .map_err(Error::Store)?;

    let Some(candidate) = candidate else {
        return Ok(None);
    };
    let job_id: String = candidate.try_get("id").map_err(Error::Store)?;

    sqlx::query("UPDATE jobs SET state = 'processing', worker_id = ?, updated_at = ? WHERE id = ?")
        .bind(worker_id)
        .bind(&now)
        .bind(&job_id)
        .execute(&mut **conn)
        .await
        .map_err(Error::Store)?;

    let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
        .bind(&job_id)
        .fetch_one(&mut **conn)
        .await
        .map_err(Error::Store)?;

    Ok(Some(row))
}
