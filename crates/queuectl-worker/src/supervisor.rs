//! Spawns a pool of workers, joins them, and translates an external
//! interrupt into a cooperative shutdown — never a kill.

use std::sync::Arc;

use queuectl_core::config::KEY_SHUTDOWN;
use queuectl_core::{Executor, JobStore};
use tracing::{error, info};
use uuid::Uuid;

use crate::worker::Worker;

/// Spawns `count` [`Worker`]s as Tokio tasks and awaits all of them.
///
/// Worker ids take the form `w-<8 hex chars>`. If a
/// `ctrl_c` signal arrives while workers are still running, the
/// supervisor sets `shutdown = true` in config and re-awaits — it never
/// aborts a child task, so no job is ever left in `processing` by a
/// supervisor-initiated stop.
pub async fn start_workers(
    store: Arc<dyn JobStore>,
    executor: Arc<dyn Executor>,
    count: usize,
) -> queuectl_core::Result<usize> {
    store.config_set(KEY_SHUTDOWN, "false").await?;

    let mut handles = Vec::with_capacity(count);
    for _ in 0..count {
        let id = format!("w-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let worker = Worker::new(id.clone(), Arc::clone(&store), Arc::clone(&executor));
        info!(worker_id = %id, "starting worker");
        handles.push(tokio::spawn(async move { worker.run().await }));
    }

    let ctrl_c_store = Arc::clone(&store);
    let ctrl_c_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, requesting graceful shutdown");
            let _ = ctrl_c_store.config_set(KEY_SHUTDOWN, "true").await;
        }
    });

    let mut failed = 0usize;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "worker exited with a store error");
                failed += 1;
            }
            Err(e) => {
                error!(error = %e, "worker task panicked");
                failed += 1;
            }
        }
    }

    ctrl_c_task.abort();
    Ok(failed)
}

/// Sets `shutdown = true`; used by `queuectl worker stop`.
pub async fn request_stop(store: &dyn JobStore) -> queuectl_core::Result<()> {
    store.config_set(KEY_SHUTDOWN, "true").await
}
