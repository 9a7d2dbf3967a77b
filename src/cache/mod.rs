//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and LRU eviction, plus the
//! registry that exposes every named cache to the admin surface.

mod access;
mod entry;
mod registry;
mod stats;
mod store;


// Re-export public types
pub use access::AccessOrder;
pub use entry::CacheEntry;
pub use registry::{shared, CacheAdmin, CacheRegistry, SharedCache};
pub use stats::{CacheReport, CacheStats};
pub use store::CacheStore;
