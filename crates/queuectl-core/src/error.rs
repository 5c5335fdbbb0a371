//! The engine's error taxonomy: client errors, store
//! contention, and fatal corruption are distinguished so callers can
//! react appropriately instead of treating every failure the same way.

use thiserror::Error;

/// Errors the engine itself can produce. Executor failures are not
/// represented here — they are absorbed by the retry policy and surface
/// only as `last_error` text, never as a `Result::Err`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {0} is not in the dead state")]
    NotDead(String),

    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("unknown state filter: {0}")]
    UnknownState(String),

    #[error("store is busy, retry")]
    Busy,

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// `true` for transient conditions a caller should retry rather than
    /// report. Used by the claim loop to distinguish store contention
    /// from a real failure.
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy)
            || matches!(self, Error::Store(sqlx::Error::Database(e)) if e.message().contains("database is locked"))
    }
}
