//! Command-line surface. A thin wrapper: every verb below
//! does argument validation and then calls straight into [`crate::admin::Admin`].

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "queuectl",
    about = "Background job queue with workers, retries and a dead-letter queue"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a new job to the queue.
    Enqueue(EnqueueArgs),
    /// Worker pool controls.
    Worker {
        #[command(subcommand)]
        command: WorkerCommand,
    },
    /// Show job state counts and active workers.
    Status,
    /// List jobs, optionally filtered by state.
    List {
        #[arg(long)]
        state: Option<String>,
    },
    /// Dead-letter queue operations.
    Dlq {
        #[command(subcommand)]
        command: DlqCommand,
    },
    /// Configuration get/set.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Job JSON, e.g. '{"id":"job1","command":"echo hi"}'. Optional if
    /// --id and --command (or --json-file) are given instead.
    pub payload: Option<String>,

    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub command: Option<String>,

    #[arg(long = "json-file")]
    pub json_file: Option<String>,

    #[arg(long = "max-retries")]
    pub max_retries: Option<u32>,

    #[arg(long, default_value_t = 0)]
    pub priority: i64,
}

#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Start worker processes.
    Start {
        #[arg(long, short = 'c', default_value_t = 1)]
        count: usize,
    },
    /// Signal workers to stop gracefully (finish current job).
    Stop,
}

#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    /// List dead jobs.
    List,
    /// Retry a DLQ job: reset state and attempts.
    Retry { id: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
}
