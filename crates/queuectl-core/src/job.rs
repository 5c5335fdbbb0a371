//! The job record and its lifecycle states.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length `last_error` is truncated to before it is persisted.
pub const LAST_ERROR_MAX_LEN: usize = 512;

/// A job's position in its lifecycle.
///
/// `Completed` and `Dead` are terminal: once a job reaches either, no
/// further state change occurs and `worker_id` is always `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Dead)
    }

    pub fn is_ready_candidate(self) -> bool {
        matches!(self, JobState::Pending | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Error returned when a stored state string does not match a known
/// [`JobState`] variant. Surfaces as a store-corruption condition.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized job state: {0:?}")]
pub struct UnknownJobState(pub String);

impl FromStr for JobState {
    type Err = UnknownJobState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "dead" => Ok(JobState::Dead),
            other => Err(UnknownJobState(other.to_string())),
        }
    }
}

/// A durable unit of work: a shell command, its retry budget, and its
/// current place in the lifecycle.
///
/// See the module-level invariants in `queuectl_core::lib` for the
/// constraints the store is responsible for upholding across concurrent
/// claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub attempts: u32,
    pub max_retries: u32,
    pub priority: i64,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub worker_id: Option<String>,
}

impl Job {
    /// Build a fresh `pending` job ready for enqueue, with `attempts = 0`
    /// and `next_run_at = now`.
    pub fn new_pending(id: String, command: String, max_retries: u32, priority: i64) -> Self {
        let now = Utc::now();
        Job {
            id,
            command,
            state: JobState::Pending,
            attempts: 0,
            max_retries,
            priority,
            next_run_at: now,
            created_at: now,
            updated_at: now,
            last_error: None,
            worker_id: None,
        }
    }

    /// Truncate and attach an error message, honoring
    /// [`LAST_ERROR_MAX_LEN`].
    pub fn set_last_error(&mut self, err: impl Into<String>) {
        self.last_error = Some(truncate_chars(&err.into(), LAST_ERROR_MAX_LEN));
    }
}

/// Truncate to at most `max_chars` characters, without splitting a
/// multi-byte character (plain byte slicing would panic on that).
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}
