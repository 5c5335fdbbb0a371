//! `queuectl` — durable background job queue CLI.
//!
//! This binary is intentionally thin: it parses arguments, resolves the
//! store location from `QUEUECTL_HOME`, and calls straight into
//! [`admin::Admin`] or `queuectl_worker`. All lifecycle, retry, and
//! concurrency logic lives in `queuectl-core` and `queuectl-worker`.

mod admin;
mod cli;
mod submission;
mod tables;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use queuectl_core::JobStore;
use queuectl_store_sqlite::SqliteStore;
use tracing::error;

use admin::Admin;
use cli::{Cli, Command, ConfigCommand, DlqCommand, WorkerCommand};
use submission::{resolve, SubmissionError};

const USAGE_EXIT: u8 = 2;
const OPERATIONAL_EXIT: u8 = 1;

fn queuectl_home() -> PathBuf {
    std::env::var_os("QUEUECTL_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".queuectl")
        })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let home = queuectl_home();
    if let Err(e) = std::fs::create_dir_all(&home)
        .with_context(|| format!("could not create QUEUECTL_HOME at {}", home.display()))
    {
        error!(error = %e, "could not create QUEUECTL_HOME");
        return ExitCode::from(OPERATIONAL_EXIT);
    }
    let db_path = home.join("queue.db");

    let store = match SqliteStore::open(&db_path).await {
        Ok(s) => Arc::new(s) as Arc<dyn JobStore>,
        Err(e) => {
            // Corruption / unopenable store is fatal: refuse
            // to start rather than run against a half-broken database.
            eprintln!("fatal: could not open store at {}: {e}", db_path.display());
            return ExitCode::from(OPERATIONAL_EXIT);
        }
    };

    match run(cli.command, store).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(msg)) => {
            eprintln!("error: {msg}");
            ExitCode::from(USAGE_EXIT)
        }
        Err(CliError::Operational(msg)) => {
            eprintln!("error: {msg}");
            ExitCode::from(OPERATIONAL_EXIT)
        }
    }
}

enum CliError {
    Usage(String),
    Operational(String),
}

impl From<queuectl_core::Error> for CliError {
    fn from(e: queuectl_core::Error) -> Self {
        CliError::Operational(e.to_string())
    }
}

async fn run(command: Command, store: Arc<dyn JobStore>) -> Result<(), CliError> {
    let admin = Admin::new(Arc::clone(&store));

    match command {
        Command::Enqueue(args) => {
            let submission = resolve(&args).map_err(|e| match e {
                SubmissionError::Usage(m) => CliError::Usage(m),
                SubmissionError::InvalidPayload(m) => CliError::Operational(m),
            })?;

            let job = admin
                .enqueue(submission.id, submission.command, args.max_retries, args.priority)
                .await?;
            println!("Enqueued job {}", job.id);
            Ok(())
        }

        Command::Worker { command } => match command {
            WorkerCommand::Start { count } => {
                store.config_set("shutdown", "false").await?;
                println!("Starting {count} worker(s). Ctrl+C to stop.");
                let executor = Arc::new(queuectl_worker::ShellExecutor);
                let failed = queuectl_worker::start_workers(store, executor, count).await?;
                if failed > 0 {
                    return Err(CliError::Operational(format!(
                        "{failed} worker(s) exited with an error"
                    )));
                }
                Ok(())
            }
            WorkerCommand::Stop => {
                queuectl_worker::request_stop(store.as_ref()).await?;
                println!("shutdown=true set. Workers will exit after finishing the current job.");
                Ok(())
            }
        },

        Command::Status => {
            let (counts, workers) = admin.status().await?;
            println!("{}", tables::counts_table(&counts));
            println!("{}", tables::active_workers_table(&workers));
            Ok(())
        }

        Command::List { state } => {
            let jobs = admin
                .list(state.as_deref())
                .await
                .map_err(|e| match e {
                    queuectl_core::Error::UnknownState(s) => {
                        CliError::Operational(format!("unknown state filter: {s}"))
                    }
                    other => CliError::from(other),
                })?;
            println!("{}", tables::jobs_table(&jobs));
            Ok(())
        }

        Command::Dlq { command } => match command {
            DlqCommand::List => {
                let jobs = admin.dlq_list().await?;
                println!("{}", tables::dlq_table(&jobs));
                Ok(())
            }
            DlqCommand::Retry { id } => match admin.dlq_retry(&id).await {
                Ok(job) => {
                    println!("DLQ job re-queued: {}", job.id);
                    Ok(())
                }
                Err(queuectl_core::Error::NotFound(id)) => {
                    Err(CliError::Operational(format!("not found in DLQ: {id}")))
                }
                Err(queuectl_core::Error::NotDead(id)) => {
                    Err(CliError::Operational(format!("not found in DLQ: {id}")))
                }
                Err(other) => Err(CliError::from(other)),
            },
        },

        Command::Config { command } => match command {
            ConfigCommand::Get { key } => {
                let value = admin.config_get(&key).await?;
                println!("{value}");
                Ok(())
            }
            ConfigCommand::Set { key, value } => {
                admin.config_set(&key, &value).await?;
                println!("set {key}={value}");
                Ok(())
            }
        },
    }
}
