//! Providers Module
//!
//! Boundaries to the remote collaborators. Each is an `async_trait` with one
//! HTTP implementation; tests substitute in-process fakes.

mod channel;
mod email;
mod http;
mod inference;

use serde::{Deserialize, Serialize};

pub use channel::{
    ChannelProfile, ChannelProvider, ChannelProviders, ChannelRecord, ChannelStatistics,
    SearchHit, SearchPage, YouTubeClient,
};
pub use email::{
    channel_url, ApifyClient, EmailDiscovery, EmailValidator, EmailVerdict, LeadMagicClient,
};
pub use inference::{Completion, CompletionRequest, InferenceProvider, OpenAiClient};

/// Routing variant of the channel-data provider (which credential is used).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Development,
    #[default]
    Production,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Development => "development",
            Variant::Production => "production",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
