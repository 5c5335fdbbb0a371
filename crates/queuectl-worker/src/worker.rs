//! The single-threaded worker loop: claim, execute, finalize.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use queuectl_core::config::{KEY_BACKOFF_BASE, KEY_SHUTDOWN};
use queuectl_core::policy;
use queuectl_core::{Error, Executor, JobStore};
use tracing::{error, info, warn};

/// Default cadence at which an idle worker polls for ready jobs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One logical worker: a unique id, a process id, and a polling cadence.
///
/// `Worker::run` owns the claim/execute/finalize cycle and guarantees
/// `stop_worker_record` is called on every exit path — normal shutdown,
/// an interrupt mid-command (waited out, never interrupted), or an
/// unexpected store failure.
pub struct Worker {
    pub id: String,
    pub pid: i64,
    pub poll_interval: Duration,
    store: Arc<dyn JobStore>,
    executor: Arc<dyn Executor>,
}

impl Worker {
    pub fn new(id: String, store: Arc<dyn JobStore>, executor: Arc<dyn Executor>) -> Self {
        Worker {
            id,
            pid: std::process::id() as i64,
            poll_interval: DEFAULT_POLL_INTERVAL,
            store,
            executor,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run until `shutdown` is observed or the store fails
    /// unrecoverably. Always deregisters the worker record before
    /// returning.
    pub async fn run(&self) -> queuectl_core::Result<()> {
        self.store.register_worker(&self.id, self.pid).await?;
        self.store.recover_processing().await?;

        let result = self.cycle().await;

        if let Err(e) = self.store.stop_worker_record(&self.id).await {
            error!(worker_id = %self.id, error = %e, "failed to deregister worker record");
        }

        result
    }

    async fn cycle(&self) -> queuectl_core::Result<()> {
        loop {
            let shutdown = self
                .store
                .config_get(KEY_SHUTDOWN, "false")
                .await?;
            if shutdown == "true" {
                info!(worker_id = %self.id, "shutdown requested, exiting");
                return Ok(());
            }

            let claimed = match self.store.claim_next(&self.id).await {
                Ok(job) => job,
                Err(e) if e.is_busy() => {
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let Some(job) = claimed else {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };

            info!(worker_id = %self.id, job_id = %job.id, "claimed job");
            let (rc, err) = self.executor.run(&job.command, None).await;

            if rc == 0 {
                self.store.mark_completed(&job.id).await?;
                info!(worker_id = %self.id, job_id = %job.id, "completed");
            } else {
                let attempts = job.attempts + 1;
                let base_raw = self.store.config_get(KEY_BACKOFF_BASE, "2.0").await?;
                let base = policy::parse_backoff_base(&base_raw);
                let delay = policy::backoff_delay(base, attempts);
                let next_run_at = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::seconds(0));
                let truncated = queuectl_core::job::truncate_chars(
                    &err,
                    queuectl_core::job::LAST_ERROR_MAX_LEN,
                );

                self.store
                    .mark_failed_or_dead(
                        &job.id,
                        attempts,
                        job.max_retries,
                        Some(truncated.as_str()),
                        next_run_at,
                    )
                    .await?;

                if policy::is_dead(attempts, job.max_retries) {
                    warn!(worker_id = %self.id, job_id = %job.id, attempts, "exhausted retries, moved to dead letter");
                } else {
                    warn!(worker_id = %self.id, job_id = %job.id, attempts, ?delay, "failed, scheduled retry");
                }
            }
        }
    }
}

/// Retried on [`Error::Busy`] at the call site rather than inside the
/// store itself, so the policy for "how long to wait" stays with the
/// worker loop, not the storage backend.
pub fn is_retryable(err: &Error) -> bool {
    err.is_busy()
}
