//! The `JobStore` trait: the one seam between the engine's pure logic
//! (worker loop, policy) and durable storage. `queuectl-store-sqlite`
//! is the sole production implementation; tests substitute an
//! in-memory SQLite pool through the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::job::{Job, JobState};
use crate::worker_record::WorkerRecord;

/// Durable, concurrency-safe access to jobs, config, and worker
/// registrations.
///
/// Every operation either commits atomically or leaves no effect. The
/// privileged [`JobStore::claim_next`] is the only operation that may
/// race across workers and is the one obligated to be serializable.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace a job by id. Overwrites every lifecycle field,
    /// used both at enqueue and at DLQ-retry (a full reset).
    async fn upsert_job(&self, job: &Job) -> Result<()>;

    async fn get_job(&self, id: &str) -> Result<Option<Job>>;

    /// Jobs ordered by `created_at` ascending, optionally filtered to a
    /// single state.
    async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<Job>>;

    async fn counts_by_state(&self) -> Result<Vec<(JobState, i64)>>;

    async fn config_get(&self, key: &str, default: &str) -> Result<String>;

    async fn config_set(&self, key: &str, value: &str) -> Result<()>;

    async fn register_worker(&self, id: &str, pid: i64) -> Result<()>;

    async fn stop_worker_record(&self, id: &str) -> Result<()>;

    async fn list_active_workers(&self) -> Result<Vec<WorkerRecord>>;

    /// Rewrite every `processing` row to `failed` with `next_run_at =
    /// now`, `worker_id = None`. Idempotent; safe to call on every
    /// worker startup.
    async fn recover_processing(&self) -> Result<u64>;

    /// Atomically claim the single highest-priority ready job for
    /// `worker_id`, ordered `(priority DESC, next_run_at ASC, created_at
    /// ASC)`. Returns `None` when no job is ready. On contention for the
    /// store's write lock, implementations return [`crate::Error::Busy`]
    /// rather than blocking indefinitely, so the caller can back off.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<Job>>;

    async fn mark_completed(&self, id: &str) -> Result<()>;

    /// Finalize a failed attempt. `attempts` is already incremented by
    /// the caller; the store decides `failed` vs. `dead` by comparing
    /// against `max_retries` (tie-break: equality is dead).
    async fn mark_failed_or_dead(
        &self,
        id: &str,
        attempts: u32,
        max_retries: u32,
        last_error: Option<&str>,
        next_run_at: DateTime<Utc>,
    ) -> Result<()>;
}
