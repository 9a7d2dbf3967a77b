//! Batch Module
//!
//! Ordered, cache-aware batch runs with a typed progress stream.

mod events;
mod key;
mod orchestrator;

pub use events::{ChannelSink, ProgressSink, RecordingSink, StreamEvent};
pub use key::{content_key, id_set_key};
pub use orchestrator::{BatchOrchestrator, BatchProcessor, BatchSummary};
