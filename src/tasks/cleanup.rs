//! Cache Cleanup Task
//!
//! Background task that periodically removes expired entries from every
//! registered cache.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheRegistry;

/// Spawns a background task that sweeps expired entries from all caches.
///
/// The task sleeps for `cleanup_interval_secs` between sweeps and runs until
/// aborted through the returned handle during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cleanup_handle = spawn_cleanup_task(context.registry.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(registry: CacheRegistry, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs);

    tokio::spawn(async move {
        info!(
            interval_secs = cleanup_interval_secs,
            caches = registry.len(),
            "starting cache cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = registry.cleanup_expired().await;
            if removed > 0 {
                info!(removed, "cache cleanup removed expired entries");
            } else {
                debug!("cache cleanup found no expired entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{shared, CacheStore};

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let mut registry = CacheRegistry::new();
        let cache = registry.register(shared(CacheStore::new(
            "Test",
            100,
            Duration::from_secs(300),
        )));
        {
            let mut store = cache.write().await;
            store.set("expire_soon", "value".to_string(), Some(Duration::from_secs(1)));
            store.set("long_lived", "value".to_string(), None);
        }

        let handle = spawn_cleanup_task(registry, 2);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        {
            let mut store = cache.write().await;
            assert_eq!(store.len(), 1, "Expired entry should have been swept");
            assert_eq!(store.get("long_lived"), Some("value".to_string()));
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(CacheRegistry::new(), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
