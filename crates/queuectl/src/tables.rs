//! Pretty-printed tables, the Rust analogue of the original's
//! `rich.table.Table` ("thin wrappers over the
//! engine" — they hold no logic, only formatting).

use comfy_table::Table;
use queuectl_core::job::Job;
use queuectl_core::{JobState, WorkerRecord};

pub fn counts_table(counts: &[(JobState, i64)]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["state", "count"]);
    for (state, count) in counts {
        table.add_row(vec![state.to_string(), count.to_string()]);
    }
    table
}

pub fn active_workers_table(workers: &[WorkerRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["worker_id", "pid", "started_at"]);
    for w in workers {
        table.add_row(vec![w.id.clone(), w.pid.to_string(), w.started_at.to_rfc3339()]);
    }
    table
}

pub fn jobs_table(jobs: &[Job]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "id",
        "state",
        "attempts",
        "max_retries",
        "priority",
        "next_run_at",
        "updated_at",
        "command",
    ]);
    for j in jobs {
        table.add_row(vec![
            j.id.clone(),
            j.state.to_string(),
            j.attempts.to_string(),
            j.max_retries.to_string(),
            j.priority.to_string(),
            j.next_run_at.to_rfc3339(),
            j.updated_at.to_rfc3339(),
            j.command.clone(),
        ]);
    }
    table
}

pub fn dlq_table(jobs: &[Job]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["id", "attempts", "max_retries", "last_error"]);
    for j in jobs {
        let err = j.last_error.as_deref().unwrap_or("");
        let truncated: String = err.chars().take(80).collect();
        table.add_row(vec![
            j.id.clone(),
            j.attempts.to_string(),
            j.max_retries.to_string(),
            truncated,
        ]);
    }
    table
}
