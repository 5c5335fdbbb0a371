//! The Admin API: a thin facade over `JobStore`. Every
//! method here is what the CLI calls directly — there is no additional
//! layer between argument parsing and the store.

use std::sync::Arc;

use chrono::Utc;
use queuectl_core::config::KEY_MAX_RETRIES;
use queuectl_core::error::{Error, Result};
use queuectl_core::job::Job;
use queuectl_core::{JobState, JobStore};

pub struct Admin {
    store: Arc<dyn JobStore>,
}

impl Admin {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Admin { store }
    }

    /// Create a `pending` job with `attempts = 0`, `next_run_at = now`.
    /// When `max_retries` is omitted, the `max_retries` config key at
    /// enqueue time is copied in. Re-enqueuing an existing id is a full
    /// reset of the row.
    pub async fn enqueue(
        &self,
        id: String,
        command: String,
        max_retries: Option<u32>,
        priority: i64,
    ) -> Result<Job> {
        let max_retries = match max_retries {
            Some(n) => n,
            None => {
                let raw = self
                    .store
                    .config_get(KEY_MAX_RETRIES, "3")
                    .await?;
                raw.parse().unwrap_or(3)
            }
        };

        let job = Job::new_pending(id, command, max_retries, priority);
        self.store.upsert_job(&job).await?;
        Ok(job)
    }

    pub async fn list(&self, state: Option<&str>) -> Result<Vec<Job>> {
        let state = state.map(parse_state).transpose()?;
        self.store.list_jobs(state).await
    }

    pub async fn status(&self) -> Result<(Vec<(JobState, i64)>, Vec<queuectl_core::WorkerRecord>)> {
        let counts = self.store.counts_by_state().await?;
        let workers = self.store.list_active_workers().await?;
        Ok((counts, workers))
    }

    pub async fn dlq_list(&self) -> Result<Vec<Job>> {
        self.store.list_jobs(Some(JobState::Dead)).await
    }

    /// Requires the job to currently be `dead`; any other state (or a
    /// missing job) is a client error.
    pub async fn dlq_retry(&self, id: &str) -> Result<Job> {
        let Some(mut job) = self.store.get_job(id).await? else {
            return Err(Error::NotFound(id.to_string()));
        };
        if job.state != JobState::Dead {
            return Err(Error::NotDead(id.to_string()));
        }

        let now = Utc::now();
        job.state = JobState::Pending;
        job.attempts = 0;
        job.last_error = None;
        job.next_run_at = now;
        job.updated_at = now;
        job.worker_id = None;

        self.store.upsert_job(&job).await?;
        Ok(job)
    }

    pub async fn config_get(&self, key: &str) -> Result<String> {
        self.store.config_get(key, "").await
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.store.config_set(key, value).await
    }
}

fn parse_state(s: &str) -> Result<JobState> {
    s.parse().map_err(|_| Error::UnknownState(s.to_string()))
}
