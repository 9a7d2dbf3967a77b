//! Services Module
//!
//! Domain operations composed from the providers and the caching and
//! coordination primitives.

mod analysis;
mod channels;
mod emails;
mod prompts;

pub use analysis::{AnalysisRecord, AnalysisService, ChannelInput};
pub use channels::{
    is_valid_channel_id, normalize_ids, static_key, stats_key, username_key, ChannelService,
};
pub use emails::{EmailValidationService, ValidatedEmail};
