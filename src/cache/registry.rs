//! Cache Registry Module
//!
//! Holds every named cache of the process behind one administrative surface:
//! per-cache statistics, full invalidation and the periodic expiry sweep.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheReport, CacheStore};

/// A cache store shared between tasks.
pub type SharedCache<V> = Arc<RwLock<CacheStore<V>>>;

/// Wraps a store for sharing.
pub fn shared<V>(store: CacheStore<V>) -> SharedCache<V> {
    Arc::new(RwLock::new(store))
}

// == Cache Admin ==
/// Type-erased administrative view of a cache, whatever its value type.
#[async_trait]
pub trait CacheAdmin: Send + Sync {
    async fn report(&self) -> CacheReport;
    async fn clear(&self);
    async fn cleanup_expired(&self) -> usize;
}

#[async_trait]
impl<V> CacheAdmin for RwLock<CacheStore<V>>
where
    V: Clone + Send + Sync,
{
    async fn report(&self) -> CacheReport {
        self.write().await.report()
    }

    async fn clear(&self) {
        self.write().await.clear();
    }

    async fn cleanup_expired(&self) -> usize {
        self.write().await.cleanup_expired()
    }
}

// == Cache Registry ==
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: Vec<Arc<dyn CacheAdmin>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cache and hands it back for the owner to keep.
    pub fn register<V>(&mut self, cache: SharedCache<V>) -> SharedCache<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        self.caches.push(cache.clone());
        cache
    }

    /// Per-cache statistics, in registration order.
    pub async fn reports(&self) -> Vec<CacheReport> {
        let mut reports = Vec::with_capacity(self.caches.len());
        for cache in &self.caches {
            reports.push(cache.report().await);
        }
        reports
    }

    pub async fn clear_all(&self) {
        for cache in &self.caches {
            cache.clear().await;
        }
    }

    /// Sweeps every cache, returning the total number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        for cache in &self.caches {
            removed += cache.cleanup_expired().await;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}
