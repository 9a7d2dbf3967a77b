//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, sets, deletes and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Monotonically increasing cache counters.
///
/// Counters live as long as the owning store; `clear` does not reset them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of stores, overwrites included
    pub sets: u64,
    /// Number of explicit deletions of a present key
    pub deletes: u64,
    /// Number of entries discarded by LRU pressure or the expiry sweep
    pub evictions: u64,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Hit rate as a percentage, or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn record_evictions(&mut self, count: u64) {
        self.evictions += count;
    }
}

// == Cache Report ==
/// Point-in-time view of one named cache, as exposed on the admin surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub name: String,
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub max_entries: usize,
    pub statistics: CacheStats,
    /// Percentage, two decimals
    pub hit_rate: f64,
}

impl CacheReport {
    pub fn new(
        name: impl Into<String>,
        total_entries: usize,
        expired_entries: usize,
        max_entries: usize,
        statistics: CacheStats,
    ) -> Self {
        Self {
            name: name.into(),
            total_entries,
            valid_entries: total_entries - expired_entries,
            expired_entries,
            max_entries,
            hit_rate: (statistics.hit_rate() * 100.0).round() / 100.0,
            statistics,
        }
    }
}
