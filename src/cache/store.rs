//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{AccessOrder, CacheEntry, CacheReport, CacheStats};

// == Cache Store ==
/// Bounded key/value store with per-entry TTL and least-recently-used eviction.
///
/// Expired entries are reclaimed lazily on `get` and on `report`; the optional
/// background sweep calls [`CacheStore::cleanup_expired`].
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Name shown on the admin surface
    name: String,
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access tracker
    access: AccessOrder,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// TTL for entries stored without an override
    default_ttl: Duration,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and default TTL.
    ///
    /// # Arguments
    /// * `name` - Name reported in statistics
    /// * `max_entries` - Maximum number of entries the cache can hold (at least 1)
    /// * `default_ttl` - TTL for entries without an explicit override
    pub fn new(name: impl Into<String>, max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
            access: AccessOrder::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    // == Set ==
    /// Stores a value with the default TTL or an override.
    ///
    /// Overwriting refreshes both value and expiry and counts as a set. Inserting
    /// a new key into a full store first evicts the least recently used entry.
    /// A zero override stores an already-expired entry.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let is_overwrite = self.entries.contains_key(&key);

        if !is_overwrite && self.entries.len() >= self.max_entries {
            if let Some(victim) = self.access.evict_oldest() {
                self.entries.remove(&victim);
                self.stats.record_evictions(1);
                debug!(cache = %self.name, key = %victim, "evicted least recently used entry");
            }
        }

        let entry = CacheEntry::new(value, ttl.unwrap_or(self.default_ttl));
        self.entries.insert(key.clone(), entry);
        self.access.touch(&key);
        self.stats.record_set();
    }

    // == Get ==
    /// Retrieves an unexpired value, refreshing its access stamp.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired(),
        };

        if expired {
            self.entries.remove(key);
            self.access.remove(key);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.access.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Has ==
    /// Equivalent to `get(key).is_some()`, including its statistics side effects.
    pub fn has(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    // == Delete ==
    /// Removes an entry unconditionally. Returns whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.access.remove(key);
        let deleted = self.entries.remove(key).is_some();
        if deleted {
            self.stats.record_delete();
        }
        deleted
    }

    // == Remove Where ==
    /// Deletes every entry whose value matches `predicate`, expired or not.
    ///
    /// Returns the number of entries removed.
    pub fn remove_where(&mut self, predicate: impl Fn(&V) -> bool) -> usize {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| predicate(&entry.value))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &matching {
            self.entries.remove(key);
            self.access.remove(key);
            self.stats.record_delete();
        }
        matching.len()
    }

    // == Clear ==
    /// Empties the store. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.access.clear();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, counting them as evictions.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.entries.remove(key);
            self.access.remove(key);
        }

        self.stats.record_evictions(expired_keys.len() as u64);
        expired_keys.len()
    }

    // == Report ==
    /// Sweeps lazily-expired entries, then returns counts and counters.
    ///
    /// `total_entries` is the size before the sweep and `expired_entries` the
    /// number of entries it removed, so `valid_entries` is what remains.
    pub fn report(&mut self) -> CacheReport {
        let total = self.entries.len();
        let expired = self.cleanup_expired();
        CacheReport::new(
            self.name.clone(),
            total,
            expired,
            self.max_entries,
            self.stats,
        )
    }

    /// Raw counters without sweeping.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
