//! Channel Analysis Service
//!
//! Turns lists of channels into personalised outreach records, a few channels
//! per inference call. Batches run through the orchestrator, so identical
//! batches are computed once and served from the analysis cache afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::batch::{content_key, BatchOrchestrator, BatchProcessor, BatchSummary, ProgressSink};
use crate::cache::{shared, CacheRegistry, CacheStore};
use crate::config::Config;
use crate::cost::{SharedCosts, TokenUsage};
use crate::error::{RelayError, Result};
use crate::providers::{EmailDiscovery, InferenceProvider};
use crate::retry::RetryPolicy;
use crate::services::prompts::{self, AnalysisPromptItem, OutreachPromptItem};
use crate::sync::KeyedMutex;

const MISSING_FIELDS: &str = "Each channel must have userName, videoTitle, and channelName";

/// One channel to analyse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInput {
    pub channel_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub video_title: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub video_description: Option<String>,
}

/// Analysis output for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub channel_id: String,
    pub user_name: String,
    pub analyzed_title: String,
    pub analyzed_name: String,
    /// Comma-joined discovered addresses, empty when none
    pub email: String,
    pub email_message: String,
}

#[derive(Deserialize)]
struct AnalysisResponse {
    results: Vec<AnalyzedChannel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedChannel {
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    analyzed_title: String,
    #[serde(default)]
    analyzed_name: String,
}

#[derive(Deserialize)]
struct OutreachResponse {
    #[serde(default)]
    results: Vec<OutreachMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutreachMessage {
    channel_id: String,
    #[serde(default)]
    email_message: String,
}

/// Rejects a response that does not hold one complete result per channel.
fn check_results(results: &[AnalyzedChannel], expected: usize) -> Result<()> {
    if results.len() != expected {
        return Err(RelayError::ParseFailure(format!(
            "Result count mismatch: expected {}, got {}",
            expected,
            results.len()
        )));
    }
    for result in results {
        let missing: Vec<&str> = [
            ("channelId", &result.channel_id),
            ("userName", &result.user_name),
            ("analyzedTitle", &result.analyzed_title),
            ("analyzedName", &result.analyzed_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(RelayError::ParseFailure(format!(
                "Missing required fields in result: {}",
                missing.join(", ")
            )));
        }
    }
    Ok(())
}

// == Analysis Service ==
pub struct AnalysisService {
    inference: Arc<dyn InferenceProvider>,
    discovery: Arc<dyn EmailDiscovery>,
    costs: SharedCosts,
    orchestrator: BatchOrchestrator<AnalysisRecord>,
    batch_size: usize,
}

impl AnalysisService {
    pub fn new(
        inference: Arc<dyn InferenceProvider>,
        discovery: Arc<dyn EmailDiscovery>,
        costs: SharedCosts,
        mutex: Arc<KeyedMutex>,
        registry: &mut CacheRegistry,
        config: &Config,
    ) -> Self {
        let cache = registry.register(shared(CacheStore::new(
            "Analysis",
            config.analysis_cache_max_entries,
            Duration::from_secs(config.analysis_cache_ttl),
        )));
        Self {
            inference,
            discovery,
            costs,
            orchestrator: BatchOrchestrator::new(
                cache,
                mutex,
                RetryPolicy::new(config.max_retries, config.retry_delay()),
                config.rate_limit_delay(),
            ),
            batch_size: config.analysis_batch_size.max(1),
        }
    }

    /// Analyses `channels` batch by batch, reporting each batch to `sink`.
    pub async fn analyze_stream(
        &self,
        channels: &[ChannelInput],
        batch_size: Option<usize>,
        sink: &dyn ProgressSink<AnalysisRecord>,
    ) -> Result<BatchSummary> {
        let processor = AnalysisProcessor { service: self };
        self.orchestrator
            .run(
                &processor,
                channels,
                batch_size.unwrap_or(self.batch_size),
                sink,
            )
            .await
    }

    async fn analyze(&self, batch: &[ChannelInput]) -> Result<Vec<AnalyzedChannel>> {
        let items: Vec<AnalysisPromptItem<'_>> = batch
            .iter()
            .map(|channel| AnalysisPromptItem {
                channel_id: &channel.channel_id,
                user_name: &channel.user_name,
                channel_name: &channel.channel_name,
                video_title: &channel.video_title,
                video_description: channel.video_description.as_deref().unwrap_or(""),
            })
            .collect();

        let completion = self
            .inference
            .complete(prompts::analysis_request(&items))
            .await?;
        self.record_cost(completion.usage, "channel_analysis").await;

        let response: AnalysisResponse = serde_json::from_value(completion.content)
            .map_err(|e| RelayError::ParseFailure(format!("Invalid response structure: {}", e)))?;
        check_results(&response.results, batch.len())?;
        Ok(response.results)
    }

    /// Outreach messages keyed by channel id; the first message for an id wins.
    /// Failures yield no messages.
    async fn write_messages(
        &self,
        records: &[AnalysisRecord],
        batch: &[ChannelInput],
    ) -> HashMap<String, String> {
        let items: Vec<OutreachPromptItem<'_>> = records
            .iter()
            .zip(batch)
            .map(|(record, channel)| OutreachPromptItem {
                channel_id: &record.channel_id,
                analyzed_name: &record.analyzed_name,
                analyzed_title: &record.analyzed_title,
                video_description: channel.video_description.as_deref().unwrap_or(""),
            })
            .collect();

        let completion = match self.inference.complete(prompts::outreach_request(&items)).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!(count = records.len(), error = %err, "outreach generation failed");
                return HashMap::new();
            }
        };
        self.record_cost(completion.usage, "email_generation").await;

        match serde_json::from_value::<OutreachResponse>(completion.content) {
            Ok(response) => {
                let mut messages = HashMap::new();
                for message in response.results {
                    messages
                        .entry(message.channel_id)
                        .or_insert(message.email_message);
                }
                messages
            }
            Err(err) => {
                warn!(error = %err, "unreadable outreach response");
                HashMap::new()
            }
        }
    }

    async fn record_cost(&self, usage: TokenUsage, operation: &str) {
        self.costs
            .write()
            .await
            .record(self.inference.model(), usage, operation);
    }
}

struct AnalysisProcessor<'a> {
    service: &'a AnalysisService,
}

#[async_trait]
impl<'a> BatchProcessor for AnalysisProcessor<'a> {
    type Item = ChannelInput;
    type Output = AnalysisRecord;

    fn label(&self) -> &'static str {
        "channels"
    }

    fn validate(&self, items: &[ChannelInput]) -> Result<()> {
        let incomplete = items.iter().any(|channel| {
            channel.user_name.trim().is_empty()
                || channel.video_title.trim().is_empty()
                || channel.channel_name.trim().is_empty()
        });
        if incomplete {
            return Err(RelayError::InvalidRequest(MISSING_FIELDS.to_string()));
        }
        Ok(())
    }

    fn batch_key(&self, batch: &[ChannelInput]) -> String {
        let identity: Vec<_> = batch
            .iter()
            .map(|channel| {
                json!({
                    "id": channel.channel_id,
                    "videoTitle": channel.video_title,
                    "channelName": channel.channel_name,
                })
            })
            .collect();
        content_key("batch", &identity)
    }

    async fn process(&self, batch: &[ChannelInput]) -> Result<Vec<AnalysisRecord>> {
        let service = self.service;
        let ids: Vec<String> = batch.iter().map(|c| c.channel_id.clone()).collect();

        let (emails, analyzed) =
            tokio::try_join!(service.discovery.discover(&ids), service.analyze(batch))?;
        debug!(channels = batch.len(), emails = emails.len(), "batch analysed");

        // Discovered emails line up with the batch by position
        let mut records: Vec<AnalysisRecord> = batch
            .iter()
            .zip(analyzed)
            .enumerate()
            .map(|(index, (channel, result))| AnalysisRecord {
                channel_id: channel.channel_id.clone(),
                user_name: channel.user_name.clone(),
                analyzed_title: result.analyzed_title,
                analyzed_name: result.analyzed_name,
                email: emails.get(index).cloned().unwrap_or_default(),
                email_message: String::new(),
            })
            .collect();

        // Repeated ids in one batch share a message
        let messages = service.write_messages(&records, batch).await;
        for record in &mut records {
            record.email_message = messages.get(&record.channel_id).cloned().unwrap_or_default();
        }
        Ok(records)
    }
}
