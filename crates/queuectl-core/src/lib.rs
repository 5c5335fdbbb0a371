//! # queuectl-core
//!
//! The durable job queue's engine: the job data model and lifecycle, the
//! `JobStore` seam that storage backends implement, the retry/backoff/
//! dead-letter policy, and the `Executor` contract. Nothing in this
//! crate spawns a process, opens a database, or touches the clock apart
//! from timestamping new rows — that is deliberate: the worker loop and
//! the concrete store live in separate crates so this one stays testable
//! as pure logic over trait objects.
//!
//! ## Key invariants
//!
//! 1. At most one row per job id.
//! 2. `state = processing` implies `worker_id` is set.
//! 3. `state` in `{completed, dead}` is terminal: `worker_id` is `None`
//!    and no further state change occurs.
//! 4. `attempts <= max_retries` always; a job becomes `dead` exactly when
//!    `attempts == max_retries` after a failure.
//! 5. `next_run_at` is only meaningful for `pending` and `failed`.
//! 6. `updated_at` is non-decreasing per job id.
//!
//! ## What this crate is not
//!
//! Not a scheduler, not a distributed coordinator, not a process
//! supervisor — those live in `queuectl-worker`. This crate only answers
//! "what should happen next" and "how is a job shaped", never "who runs
//! it" or "where is it stored".

pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod policy;
pub mod store;
pub mod worker_record;

pub use error::{Error, Result};
pub use executor::Executor;
pub use job::{Job, JobState};
pub use store::JobStore;
pub use worker_record::WorkerRecord;

pub use async_trait::async_trait;
