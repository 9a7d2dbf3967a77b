//! Request DTOs for the relay API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::providers::Variant;
use crate::services::ChannelInput;

/// Request body for `POST /channels`: ids, usernames, or both.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsRequest {
    #[serde(default)]
    pub channel_ids: Vec<String>,
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default)]
    pub variant: Variant,
}

impl ChannelsRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.channel_ids.is_empty() && self.usernames.is_empty() {
            return Some("Provide channelIds or usernames".to_string());
        }
        None
    }
}

/// Request body for `POST /channels/stream`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStreamRequest {
    #[serde(default)]
    pub channel_ids: Vec<String>,
    #[serde(default)]
    pub variant: Variant,
}

/// Query string of `GET /channels/search`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page_token: Option<String>,
    #[serde(default)]
    pub variant: Variant,
}

/// `?variant=` on routes that take nothing else.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantQuery {
    #[serde(default)]
    pub variant: Variant,
}

/// Request body for `POST /analysis/stream`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub channels: Vec<ChannelInput>,
    /// Overrides the configured channels per batch
    pub batch_size: Option<usize>,
}

/// Request body for `POST /emails/validate`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailValidationRequest {
    #[serde(default)]
    pub emails: Vec<String>,
    /// Return only the addresses that validate, comma-joined entries split
    #[serde(default)]
    pub valid_only: bool,
}
