//! API Handlers
//!
//! HTTP request handlers for each relay endpoint. Batch runs are streamed as
//! server-sent events: the run is spawned and reports through a channel, so it
//! completes and fills the caches even when the client goes away.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::batch::{ChannelSink, StreamEvent};
use crate::config::Config;
use crate::context::RelayContext;
use crate::error::{RelayError, Result};
use crate::models::{
    AnalysisRequest, CacheStatsResponse, ChannelStreamRequest, ChannelsRequest, ClearResponse,
    DataResponse, EmailValidationRequest, HealthResponse, InvalidateResponse, QuotaResponse,
    SearchQuery, VariantQuery,
};
use crate::providers::{ChannelRecord, SearchPage};
use crate::services::AnalysisRecord;

/// Events buffered per stream before the run waits for the client.
const EVENT_BUFFER: usize = 32;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<RelayContext>,
}

impl AppState {
    pub fn new(context: RelayContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    /// Builds the context and its HTTP providers from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        Ok(Self::new(RelayContext::from_config(config)?))
    }
}

// == Event Streams ==
/// Forwards run events to the client as `event: <type>` / `data: <json>`.
/// The stream ends once the run drops its sender.
fn event_stream<T>(
    receiver: mpsc::Receiver<StreamEvent<T>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>
where
    T: Serialize + Send + 'static,
{
    let events = stream::unfold(receiver, |mut receiver| async move {
        let event = receiver.recv().await?;
        let sse = Event::default()
            .event(event.name())
            .json_data(&event)
            .unwrap_or_else(|err| {
                warn!(error = %err, "unserialisable stream event");
                Event::default().event("error").data(r#"{"message":"Internal error"}"#)
            });
        Some((Ok(sse), receiver))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /quota
pub async fn quota_handler(State(state): State<AppState>) -> Json<QuotaResponse> {
    let (quota, is_low, is_exhausted) = {
        let mut tracker = state.context.quota.write().await;
        (tracker.status(), tracker.is_low(), tracker.is_exhausted())
    };
    let inference = state.context.costs.write().await.status();

    Json(QuotaResponse {
        quota,
        is_low,
        is_exhausted,
        inference,
    })
}

/// Handler for GET /cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        caches: state.context.registry.reports().await,
    })
}

/// Handler for DELETE /cache
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let registry = &state.context.registry;
    registry.clear_all().await;
    Json(ClearResponse::new(registry.len()))
}

/// Handler for DELETE /cache/channels/:channel_id
pub async fn invalidate_channel_handler(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<VariantQuery>,
) -> Json<InvalidateResponse> {
    let invalidated = state
        .context
        .channels
        .invalidate_channel(&channel_id, query.variant)
        .await;

    Json(InvalidateResponse {
        channel_id,
        variant: query.variant,
        invalidated,
    })
}

/// Handler for POST /channels
///
/// Fetches by ids and by usernames; a channel found both ways is listed once.
pub async fn channels_handler(
    State(state): State<AppState>,
    Json(req): Json<ChannelsRequest>,
) -> Result<Json<DataResponse<ChannelRecord>>> {
    if let Some(error_msg) = req.validate() {
        return Err(RelayError::InvalidRequest(error_msg));
    }
    let channels = &state.context.channels;

    let mut records = channels
        .get_channels_by_ids(&req.channel_ids, req.variant)
        .await?;
    let by_username = channels
        .get_channels_by_usernames(&req.usernames, req.variant)
        .await?;
    for record in by_username {
        if !records.iter().any(|known| known.id() == record.id()) {
            records.push(record);
        }
    }

    Ok(Json(DataResponse::new(records)))
}

/// Handler for GET /channels/search
pub async fn search_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchPage>> {
    let page = state
        .context
        .channels
        .search_channels(&query.q, query.page_token.as_deref(), query.variant)
        .await?;
    Ok(Json(page))
}

/// Handler for POST /channels/stream
pub async fn channels_stream_handler(
    State(state): State<AppState>,
    Json(req): Json<ChannelStreamRequest>,
) -> impl IntoResponse {
    let (sender, receiver) = mpsc::channel::<StreamEvent<ChannelRecord>>(EVENT_BUFFER);
    let context = state.context.clone();

    tokio::spawn(async move {
        let sink = ChannelSink::new(sender);
        let result = context
            .channels
            .stream_channels(&req.channel_ids, req.variant, &sink)
            .await;
        if let Err(err) = result {
            debug!(error = %err, "channel stream ended early");
        }
    });

    event_stream(receiver)
}

/// Handler for POST /analysis/stream
pub async fn analysis_stream_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> impl IntoResponse {
    let (sender, receiver) = mpsc::channel::<StreamEvent<AnalysisRecord>>(EVENT_BUFFER);
    let context = state.context.clone();

    tokio::spawn(async move {
        let sink = ChannelSink::new(sender);
        let result = context
            .analysis
            .analyze_stream(&req.channels, req.batch_size, &sink)
            .await;
        if let Err(err) = result {
            debug!(error = %err, "analysis stream ended early");
        }
    });

    event_stream(receiver)
}

/// Handler for POST /emails/validate
pub async fn validate_emails_handler(
    State(state): State<AppState>,
    Json(req): Json<EmailValidationRequest>,
) -> Result<Response> {
    if req.emails.is_empty() {
        return Err(RelayError::InvalidRequest(
            "Emails must be a non-empty array".to_string(),
        ));
    }
    let emails = &state.context.emails;

    if req.valid_only {
        let valid = emails.filter_valid_emails(&req.emails).await?;
        return Ok(Json(DataResponse::new(valid)).into_response());
    }
    let results = emails.validate_emails(&req.emails).await?;
    Ok(Json(DataResponse::new(results)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Variant;

    fn state() -> AppState {
        AppState::from_config(Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_quota_handler_starts_unused() {
        let response = quota_handler(State(state())).await;
        assert_eq!(response.quota.used, 0);
        assert_eq!(response.quota.total, 10_000);
        assert!(!response.is_low);
        assert!(!response.is_exhausted);
        assert_eq!(response.inference.daily.input_tokens, 0);
    }

    #[tokio::test]
    async fn test_cache_stats_handler_lists_caches() {
        let response = cache_stats_handler(State(state())).await;
        assert_eq!(response.caches.len(), 6);
    }

    #[tokio::test]
    async fn test_invalidate_unknown_channel() {
        let response = invalidate_channel_handler(
            State(state()),
            Path("UC_x5XG1OV2P6uZZ5FSM9Ttw".to_string()),
            Query(VariantQuery {
                variant: Variant::Development,
            }),
        )
        .await;
        assert!(!response.invalidated);
        assert_eq!(response.variant, Variant::Development);
    }

    #[tokio::test]
    async fn test_channels_handler_rejects_empty_request() {
        let result = channels_handler(State(state()), Json(ChannelsRequest::default())).await;
        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_search_handler_requires_query() {
        let query = SearchQuery {
            q: "   ".to_string(),
            page_token: None,
            variant: Variant::Production,
        };
        let result = search_handler(State(state()), Query(query)).await;
        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_validate_emails_rejects_empty_list() {
        let req = EmailValidationRequest {
            emails: vec![],
            valid_only: false,
        };
        let result = validate_emails_handler(State(state()), Json(req)).await;
        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
    }
}
