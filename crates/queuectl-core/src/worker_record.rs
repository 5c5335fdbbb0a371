//! The `workers` table: diagnostic provenance for who is holding what.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A worker process's registration row.
///
/// A worker is "active" iff `stopped_at` is `None`. The engine never
/// garbage-collects stopped rows; they remain for diagnostic queries
/// only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub id: String,
    pub pid: i64,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl WorkerRecord {
    pub fn is_active(&self) -> bool {
        self.stopped_at.is_none()
    }
}
