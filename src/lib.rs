//! Channel Relay - a caching, quota-aware relay for channel data and inference
//!
//! Fronts a channel-data API, an inference API and two email APIs with TTL/LRU
//! caches, a daily quota ledger, retries, request coalescing and batch runs
//! that report progress as server-sent events.

pub mod api;
pub mod batch;
pub mod cache;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod models;
pub mod providers;
pub mod quota;
pub mod retry;
pub mod services;
pub mod sync;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use context::{Providers, RelayContext};
pub use error::{RelayError, Result};
pub use tasks::{spawn_cleanup_task, spawn_mutex_sweep};
