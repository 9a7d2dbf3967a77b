//! Coordination Module
//!
//! Primitives that keep concurrent callers from repeating remote work:
//! - `InFlight`: collapses identical pending fetches into one call
//! - `KeyedMutex`: serializes an expensive computation per key, with an
//!   abandoned-lock sweep

mod in_flight;
mod keyed_mutex;

pub use in_flight::InFlight;
pub use keyed_mutex::{Acquire, KeyedMutex, MutexPermit, PendingRelease};
