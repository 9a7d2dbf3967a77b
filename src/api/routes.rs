//! API Routes
//!
//! Configures the Axum router with all relay endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    analysis_stream_handler, cache_stats_handler, channels_handler, channels_stream_handler,
    clear_cache_handler, health_handler, invalidate_channel_handler, quota_handler,
    search_handler, validate_emails_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /quota` - Quota usage and inference spend
/// - `GET /cache/stats` - Per-cache statistics
/// - `DELETE /cache` - Clear every cache
/// - `DELETE /cache/channels/:channel_id` - Drop one channel's cached data
/// - `POST /channels` - Fetch channels by ids and/or usernames
/// - `POST /channels/stream` - Fetch channels in batches with progress events
/// - `GET /channels/search` - Search channels
/// - `POST /analysis/stream` - Analyse channels in batches with progress events
/// - `POST /emails/validate` - Validate email addresses
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/quota", get(quota_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route("/cache", delete(clear_cache_handler))
        .route(
            "/cache/channels/:channel_id",
            delete(invalidate_channel_handler),
        )
        .route("/channels", post(channels_handler))
        .route("/channels/stream", post(channels_stream_handler))
        .route("/channels/search", get(search_handler))
        .route("/analysis/stream", post(analysis_stream_handler))
        .route("/emails/validate", post(validate_emails_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
