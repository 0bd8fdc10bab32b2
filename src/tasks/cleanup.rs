//! Cleanup Task
//!
//! Background task that periodically sweeps expired records and stale
//! dedup entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheEngine, RecordStore};

/// Spawns a background task that periodically runs `evict_expired` and
/// purges the dedup guard.
///
/// # Arguments
/// * `engine` - Shared cache engine
/// * `cleanup_interval_secs` - Interval in seconds between cleanup runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let engine = Arc::new(CacheEngine::new(MemoryStore::new(), CachePolicy::default()));
/// let cleanup_handle = spawn_cleanup_task(engine.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<S>(
    engine: Arc<CacheEngine<S>>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()>
where
    S: RecordStore + 'static,
{
    let interval = Duration::from_secs(cleanup_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let expired = engine.evict_expired().await;
            let dedup_purged = engine.purge_dedup();

            if expired > 0 {
                info!("TTL cleanup: removed {} expired records", expired);
            } else {
                debug!("TTL cleanup: no expired records found");
            }
            if dedup_purged > 0 {
                debug!("Dedup cleanup: dropped {} stale keys", dedup_purged);
            }
        }
    })
}
