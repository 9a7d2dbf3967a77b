//! Shared HTTP plumbing for the provider clients: client construction and the
//! mapping of remote failures onto [`RelayError`].

use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{RelayError, Result};

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {}", e)))
}

/// Fails with `Internal` when a provider credential is missing.
pub(crate) fn require_key<'a>(key: &'a Option<String>, provider: &str) -> Result<&'a str> {
    key.as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| RelayError::Internal(format!("{} API key not configured", provider)))
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::Timeout(err.to_string())
        } else if err.is_decode() {
            RelayError::ParseFailure(err.to_string())
        } else if let Some(status) = err.status() {
            classify_status(status, None, &err.to_string())
        } else {
            RelayError::TransientNetwork(err.to_string())
        }
    }
}

/// Maps a non-success HTTP status to the error taxonomy.
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<u64>,
    detail: &str,
) -> RelayError {
    match status {
        StatusCode::FORBIDDEN => RelayError::quota_exhausted("API quota exceeded", retry_after),
        StatusCode::NOT_FOUND => RelayError::NotFound("Resource not found".to_string()),
        StatusCode::TOO_MANY_REQUESTS => {
            RelayError::rate_limited("Rate limit exceeded", retry_after)
        }
        StatusCode::BAD_REQUEST => RelayError::InvalidRequest(detail.to_string()),
        other => RelayError::Upstream {
            status: other.as_u16(),
            message: detail.to_string(),
        },
    }
}

/// Passes successful responses through and classifies the rest.
pub(crate) async fn check(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let detail = error_message(&body).unwrap_or_else(|| status.to_string());

    warn!(provider, status = status.as_u16(), detail = %detail, "provider call failed");
    Err(classify_status(status, retry_after, &detail))
}

/// Decodes a JSON body, reporting schema mismatches as `ParseFailure`.
pub(crate) async fn decode<T: DeserializeOwned>(provider: &str, response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        RelayError::ParseFailure(format!("unexpected {} response: {}", provider, e))
    })
}

/// `error.message` of a Google/OpenAI style error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(|message| message.as_str())
        .map(str::to_string)
}
