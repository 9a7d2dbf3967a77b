//! Error types for the relay
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Relay Error Enum ==
/// Unified error type for the relay.
///
/// Every variant carries an HTTP-like status (see [`RelayError::status`]) which
/// decides whether the backoff retrier may try again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    /// Quota exhausted locally or remotely (403), or remote rate limiting (429)
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        status: u16,
        retry_after: Option<u64>,
    },

    /// Malformed input, never retried
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Remote resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Remote response did not match the expected schema
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// Connection-level failure
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// Remote answered with an unclassified status
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// A keyed mutex entry outlived its max age and was reclaimed
    #[error("Abandoned mutex reclaimed: {0}")]
    MutexAbandoned(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    // == Constructors ==
    /// Local or remote daily quota exhaustion.
    pub fn quota_exhausted(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        RelayError::RateLimited {
            message: message.into(),
            status: 403,
            retry_after,
        }
    }

    /// Remote rate limiting (HTTP 429).
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        RelayError::RateLimited {
            message: message.into(),
            status: 429,
            retry_after,
        }
    }

    // == Status ==
    /// HTTP-like status of the failure.
    pub fn status(&self) -> u16 {
        match self {
            RelayError::RateLimited { status, .. } => *status,
            RelayError::InvalidRequest(_) => 400,
            RelayError::NotFound(_) => 404,
            RelayError::Timeout(_) => 504,
            RelayError::ParseFailure(_) => 502,
            RelayError::TransientNetwork(_) => 503,
            RelayError::Upstream { status, .. } => *status,
            RelayError::MutexAbandoned(_) | RelayError::Internal(_) => 500,
        }
    }

    // == Is Retryable ==
    /// 4xx failures other than 429 will not succeed on retry.
    pub fn is_retryable(&self) -> bool {
        let status = self.status();
        !((400..500).contains(&status) && status != 429)
    }

    /// Stable machine-readable code used in stream error events.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::RateLimited { .. } => "RATE_LIMITED",
            RelayError::InvalidRequest(_) => "INVALID_REQUEST",
            RelayError::NotFound(_) => "NOT_FOUND",
            RelayError::Timeout(_) => "TIMEOUT",
            RelayError::ParseFailure(_) => "PARSE_ERROR",
            RelayError::TransientNetwork(_) => "NETWORK_ERROR",
            RelayError::Upstream { .. } => "UPSTREAM_ERROR",
            RelayError::MutexAbandoned(_) => "MUTEX_ABANDONED",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            RelayError::RateLimited {
                status: 403,
                retry_after,
                ..
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "The request cannot be completed because you have exceeded your quota",
                    "retryAfter": retry_after,
                }),
            ),
            RelayError::RateLimited { retry_after, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "Rate limit exceeded. Please try again later.",
                    "retryAfter": retry_after,
                }),
            ),
            RelayError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request parameters", "details": msg }),
            ),
            RelayError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Resource not found", "details": msg }),
            ),
            RelayError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, json!({ "error": msg })),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error occurred while processing request" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the relay.
pub type Result<T> = std::result::Result<T, RelayError>;
