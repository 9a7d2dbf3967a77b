//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache Cleanup: Removes expired entries from every registered cache
//! - Mutex Sweep: Reclaims keyed-mutex entries whose holder never released

mod cleanup;
mod mutex_sweep;

pub use cleanup::spawn_cleanup_task;
pub use mutex_sweep::spawn_mutex_sweep;
