//! Abandoned Mutex Sweep
//!
//! Background task that reclaims keyed-mutex entries held past their max age,
//! waking anyone parked on them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::sync::KeyedMutex;

/// Spawns a background task that sweeps abandoned mutex entries every
/// `sweep_interval_secs`. Abort the returned handle to stop it.
pub fn spawn_mutex_sweep(mutex: Arc<KeyedMutex>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(interval_secs = sweep_interval_secs, "starting mutex sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let reclaimed = mutex.sweep();
            if reclaimed.is_empty() {
                debug!(held = mutex.len(), "mutex sweep found nothing abandoned");
            } else {
                info!(reclaimed = reclaimed.len(), "mutex sweep reclaimed entries");
            }
        }
    })
}
