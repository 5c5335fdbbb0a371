//! The executor contract: an opaque collaborator that runs a command
//! string and reports what happened. The engine never inspects stdout,
//! never streams output, and never learns the executor's implementation.

use std::time::Duration;

use async_trait::async_trait;

/// Runs shell commands on behalf of the worker loop.
///
/// Implementations must never panic or propagate a `Result::Err` back to
/// the caller: a spawn failure is itself reported as a non-zero exit
/// code with a descriptive message.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `command`, optionally bounded by `timeout`. Returns
    /// `(exit_code, short_error)`; `exit_code == 0` is success, any
    /// other code (including "did not run") is failure.
    async fn run(&self, command: &str, timeout: Option<Duration>) -> (i32, String);
}
