//! Access Order Module
//!
//! Tracks last-access stamps used to pick the least recently used eviction victim.

use std::collections::HashMap;

// == Access Order ==
/// Maps each key to the logical tick of its last access.
///
/// A monotonically increasing tick replaces wall-clock timestamps so that two
/// accesses within the same millisecond still order deterministically. The
/// victim is found by scanning for the smallest tick; eviction only happens on
/// `set` into a full store, so the scan stays off the read path.
#[derive(Debug, Default)]
pub struct AccessOrder {
    /// Last access tick per key
    stamps: HashMap<String, u64>,
    /// Next tick to hand out
    clock: u64,
}

impl AccessOrder {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as just accessed.
    pub fn touch(&mut self, key: &str) {
        self.clock += 1;
        match self.stamps.get_mut(key) {
            Some(stamp) => *stamp = self.clock,
            None => {
                self.stamps.insert(key.to_string(), self.clock);
            }
        }
    }

    // == Remove ==
    /// Stops tracking a key.
    pub fn remove(&mut self, key: &str) {
        self.stamps.remove(key);
    }

    // == Oldest ==
    /// Returns the least recently accessed key without removing it.
    pub fn oldest(&self) -> Option<&str> {
        self.stamps
            .iter()
            .min_by_key(|(_, stamp)| **stamp)
            .map(|(key, _)| key.as_str())
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently accessed key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let victim = self.oldest()?.to_string();
        self.stamps.remove(&victim);
        Some(victim)
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stamps.contains_key(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_order_new() {
        let order = AccessOrder::new();
        assert!(order.is_empty());
        assert_eq!(order.oldest(), None);
    }

    #[test]
    fn test_touch_new_keys() {
        let mut order = AccessOrder::new();

        order.touch("key1");
        order.touch("key2");
        order.touch("key3");

        assert_eq!(order.len(), 3);
        assert_eq!(order.oldest(), Some("key1"));
    }

    #[test]
    fn test_touch_existing_key_refreshes_it() {
        let mut order = AccessOrder::new();

        order.touch("key1");
        order.touch("key2");
        order.touch("key3");
        order.touch("key1");

        assert_eq!(order.len(), 3);
        assert_eq!(order.oldest(), Some("key2"));
    }

    #[test]
    fn test_evict_order_after_multiple_touches() {
        let mut order = AccessOrder::new();

        order.touch("a");
        order.touch("b");
        order.touch("c");
        order.touch("a");
        order.touch("c");
        order.touch("b");

        assert_eq!(order.evict_oldest(), Some("a".to_string()));
        assert_eq!(order.evict_oldest(), Some("c".to_string()));
        assert_eq!(order.evict_oldest(), Some("b".to_string()));
        assert_eq!(order.evict_oldest(), None);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut order = AccessOrder::new();

        order.touch("key1");
        order.touch("key2");
        order.remove("key1");
        order.remove("nonexistent");

        assert!(!order.contains("key1"));
        assert!(order.contains("key2"));

        order.clear();
        assert!(order.is_empty());
    }
}
