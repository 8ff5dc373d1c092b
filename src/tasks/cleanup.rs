//! TTL Cleanup Task
//!
//! Background task that periodically purges expired entries from the memory
//! and durable layers. Reads already drop expired entries lazily; the sweep
//! catches keys nobody reads again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{DurableCache, MemoryCache};

/// Spawns a background task that periodically purges expired cache entries.
///
/// # Arguments
/// * `memory` - The memory layer to sweep
/// * `durable` - The durable layer to sweep, if one is configured
/// * `cleanup_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(
    memory: Arc<MemoryCache>,
    durable: Option<Arc<DurableCache>>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed_memory = match memory.purge_expired() {
                Ok(count) => count,
                Err(e) => {
                    warn!(error = %e, "memory sweep failed");
                    0
                }
            };

            let removed_durable = match &durable {
                Some(durable) => match durable.purge_expired().await {
                    Ok(count) => count,
                    Err(e) => {
                        warn!(error = %e, "durable sweep failed");
                        0
                    }
                },
                None => 0,
            };

            if removed_memory + removed_durable > 0 {
                info!(
                    memory = removed_memory,
                    durable = removed_durable,
                    "TTL cleanup removed expired entries"
                );
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
