//! Channel-data provider: domain records, the provider trait and the YouTube
//! Data API v3 client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::providers::http::{build_client, check, decode, require_key};
use crate::providers::Variant;

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const CHANNEL_PARTS: &str = "snippet,id,contentDetails,statistics,topicDetails,brandingSettings";
const SEARCH_PAGE_SIZE: &str = "50";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// == Domain Records ==
/// Slow-changing part of a channel, cached for a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub handle: Option<String>,
    pub published_at: Option<String>,
    pub thumbnail: Option<String>,
    pub uploads_playlist: Option<String>,
    pub keywords: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Counters of a channel, cached for six hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    pub subscriber_count: u64,
    pub video_count: u64,
    pub view_count: u64,
    pub hidden_subscriber_count: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    #[serde(flatten)]
    pub profile: ChannelProfile,
    pub statistics: ChannelStatistics,
}

impl ChannelRecord {
    pub fn id(&self) -> &str {
        &self.profile.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub channel_id: String,
    pub channel_name: String,
    pub channel_description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub data: Vec<SearchHit>,
    pub next_page_token: Option<String>,
}

// == Channel Provider ==
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Looks up at most one request's worth of ids; unknown ids are omitted.
    async fn list_channels(&self, ids: &[String]) -> Result<Vec<ChannelRecord>>;

    /// Channel id behind a handle (without the leading `@`), if any.
    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>>;

    async fn search(&self, query: &str, page_token: Option<&str>) -> Result<SearchPage>;
}

/// One pre-built provider per routing variant.
#[derive(Clone)]
pub struct ChannelProviders {
    production: Arc<dyn ChannelProvider>,
    development: Arc<dyn ChannelProvider>,
}

impl ChannelProviders {
    pub fn new(
        production: Arc<dyn ChannelProvider>,
        development: Option<Arc<dyn ChannelProvider>>,
    ) -> Self {
        let development = development.unwrap_or_else(|| production.clone());
        Self {
            production,
            development,
        }
    }

    /// The same provider serves both variants.
    pub fn single(provider: Arc<dyn ChannelProvider>) -> Self {
        Self::new(provider, None)
    }

    pub fn get(&self, variant: Variant) -> &Arc<dyn ChannelProvider> {
        match variant {
            Variant::Production => &self.production,
            Variant::Development => &self.development,
        }
    }
}

// == YouTube Client ==
pub struct YouTubeClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            http: build_client(REQUEST_TIMEOUT)?,
            api_key,
            base_url: YOUTUBE_API_BASE.to_string(),
        })
    }

    /// Points the client at another host, e.g. a local stand-in.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let key = require_key(&self.api_key, "YouTube")?;
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(&[("key", key)])
            .query(query)
            .send()
            .await?;
        let response = check("youtube", response).await?;
        decode("youtube", response).await
    }
}

#[async_trait]
impl ChannelProvider for YouTubeClient {
    async fn list_channels(&self, ids: &[String]) -> Result<Vec<ChannelRecord>> {
        let joined = ids.join(",");
        debug!(count = ids.len(), "youtube channels.list");
        let list: wire::ChannelList = self
            .get("channels", &[("part", CHANNEL_PARTS), ("id", joined.as_str())])
            .await?;
        Ok(list.items.into_iter().map(wire::Channel::into_record).collect())
    }

    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>> {
        let handle = format!("@{}", handle.trim_start_matches('@'));
        let list: wire::IdList = self
            .get("channels", &[("part", "id"), ("forHandle", handle.as_str())])
            .await?;
        Ok(list.items.into_iter().next().map(|item| item.id))
    }

    async fn search(&self, query: &str, page_token: Option<&str>) -> Result<SearchPage> {
        let mut params = vec![
            ("part", "snippet"),
            ("q", query),
            ("type", "channel"),
            ("relevanceLanguage", "en"),
            ("maxResults", SEARCH_PAGE_SIZE),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let page: wire::SearchList = self.get("search", &params).await?;
        Ok(SearchPage {
            data: page
                .items
                .into_iter()
                .map(|item| SearchHit {
                    channel_id: item.snippet.channel_id,
                    channel_name: item.snippet.channel_title,
                    channel_description: item.snippet.description,
                })
                .collect(),
            next_page_token: page.next_page_token,
        })
    }
}

/// Response shapes of the YouTube Data API.
mod wire {
    use serde::Deserialize;

    use super::{ChannelProfile, ChannelRecord, ChannelStatistics};

    #[derive(Deserialize)]
    pub struct ChannelList {
        #[serde(default)]
        pub items: Vec<Channel>,
    }

    #[derive(Deserialize)]
    pub struct IdList {
        #[serde(default)]
        pub items: Vec<IdOnly>,
    }

    #[derive(Deserialize)]
    pub struct IdOnly {
        pub id: String,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Channel {
        pub id: String,
        #[serde(default)]
        pub snippet: Snippet,
        #[serde(default)]
        pub content_details: ContentDetails,
        #[serde(default)]
        pub statistics: Statistics,
        #[serde(default)]
        pub topic_details: TopicDetails,
        #[serde(default)]
        pub branding_settings: BrandingSettings,
    }

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct Snippet {
        #[serde(default)]
        pub title: String,
        #[serde(default)]
        pub description: String,
        pub custom_url: Option<String>,
        pub published_at: Option<String>,
        #[serde(default)]
        pub thumbnails: Thumbnails,
    }

    #[derive(Deserialize, Default)]
    pub struct Thumbnails {
        pub high: Option<Thumbnail>,
        pub default: Option<Thumbnail>,
    }

    #[derive(Deserialize)]
    pub struct Thumbnail {
        pub url: String,
    }

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct ContentDetails {
        #[serde(default)]
        pub related_playlists: RelatedPlaylists,
    }

    #[derive(Deserialize, Default)]
    pub struct RelatedPlaylists {
        pub uploads: Option<String>,
    }

    /// Counts arrive as decimal strings.
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct Statistics {
        pub subscriber_count: Option<String>,
        pub video_count: Option<String>,
        pub view_count: Option<String>,
        #[serde(default)]
        pub hidden_subscriber_count: bool,
    }

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct TopicDetails {
        #[serde(default)]
        pub topic_categories: Vec<String>,
    }

    #[derive(Deserialize, Default)]
    pub struct BrandingSettings {
        #[serde(default)]
        pub channel: BrandingChannel,
    }

    #[derive(Deserialize, Default)]
    pub struct BrandingChannel {
        pub keywords: Option<String>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SearchList {
        #[serde(default)]
        pub items: Vec<SearchItem>,
        pub next_page_token: Option<String>,
    }

    #[derive(Deserialize)]
    pub struct SearchItem {
        pub snippet: SearchSnippet,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SearchSnippet {
        pub channel_id: String,
        #[serde(default)]
        pub channel_title: String,
        #[serde(default)]
        pub description: String,
    }

    fn count(value: &Option<String>) -> u64 {
        value
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    impl Channel {
        pub fn into_record(self) -> ChannelRecord {
            let thumbnails = self.snippet.thumbnails;
            let thumbnail = thumbnails.high.or(thumbnails.default).map(|t| t.url);
            // Wikipedia URLs; keep the trailing topic name
            let topics = self
                .topic_details
                .topic_categories
                .iter()
                .filter_map(|url| url.rsplit('/').next())
                .map(|topic| topic.replace('_', " "))
                .collect();

            ChannelRecord {
                statistics: ChannelStatistics {
                    subscriber_count: count(&self.statistics.subscriber_count),
                    video_count: count(&self.statistics.video_count),
                    view_count: count(&self.statistics.view_count),
                    hidden_subscriber_count: self.statistics.hidden_subscriber_count,
                },
                profile: ChannelProfile {
                    id: self.id,
                    title: self.snippet.title,
                    description: self.snippet.description,
                    handle: self.snippet.custom_url,
                    published_at: self.snippet.published_at,
                    thumbnail,
                    uploads_playlist: self.content_details.related_playlists.uploads,
                    keywords: self.branding_settings.channel.keywords,
                    topics,
                },
            }
        }
    }
}
