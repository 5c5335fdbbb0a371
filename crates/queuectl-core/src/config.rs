//! The `config` table: a flat, open-ended string-to-string map.
//!
//! The key set is open-ended (operators may stash arbitrary keys), so
//! unlike [`crate::job::Job`] this is not given a fixed record type; only
//! the three recognized keys below steer engine behavior.

/// Default cap copied into new jobs when the submitter omits `max_retries`.
pub const KEY_MAX_RETRIES: &str = "max_retries";
/// Base of the exponential backoff.
pub const KEY_BACKOFF_BASE: &str = "backoff_base";
/// When `"true"`, running workers finish their current job then exit.
pub const KEY_SHUTDOWN: &str = "shutdown";

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;
pub const DEFAULT_SHUTDOWN: &str = "false";

/// Default config rows seeded into a freshly created store.
pub fn defaults() -> Vec<(&'static str, String)> {
    vec![
        (KEY_MAX_RETRIES, DEFAULT_MAX_RETRIES.to_string()),
        (KEY_BACKOFF_BASE, DEFAULT_BACKOFF_BASE.to_string()),
        (KEY_SHUTDOWN, DEFAULT_SHUTDOWN.to_string()),
    ]
}
