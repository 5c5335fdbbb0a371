//! # queuectl-worker
//!
//! The worker pool: a single-threaded claim/execute/finalize loop per
//! worker and a supervisor that spawns a pool of them, joins them, and
//! turns an interrupt into a cooperative shutdown flag rather than a
//! kill. Depends only on `queuectl-core`'s traits, so it is exercised in
//! tests against an in-memory SQLite store and a deterministic executor
//! double, never a live process pool.

pub mod shell_executor;
pub mod supervisor;
pub mod worker;

pub use shell_executor::ShellExecutor;
pub use supervisor::{request_stop, start_workers};
pub use worker::{Worker, DEFAULT_POLL_INTERVAL};
