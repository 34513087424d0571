//! Expiry Sweep Task
//!
//! Background task that periodically fires due expiry timers in the campus
//! admin lookup cache, so idle entries are released even when nobody reads.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::lookup::CampusAdminLookup;

/// Spawns a background task that purges expired admin lookup entries.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let sweep_handle = spawn_sweep_task(state.lookup.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(lookup: Arc<CampusAdminLookup>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting expiry sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = lookup.purge_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} campus admin entries", removed);
            } else {
                debug!("Expiry sweep: nothing expired");
            }
        }
    })
}
