//! Response DTOs for the relay API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheReport;
use crate::cost::CostStatus;
use crate::providers::Variant;
use crate::quota::QuotaStatus;

/// A list result with its length.
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse<T> {
    pub data: Vec<T>,
    pub count: usize,
}

impl<T> DataResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

/// Response body for `GET /quota`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaResponse {
    #[serde(flatten)]
    pub quota: QuotaStatus,
    pub is_low: bool,
    pub is_exhausted: bool,
    /// Inference spend, daily and lifetime
    pub inference: CostStatus,
}

/// Response body for `GET /cache/stats`
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub caches: Vec<CacheReport>,
}

/// Response body for `DELETE /cache`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new(caches: usize) -> Self {
        Self {
            message: format!("Cleared {} caches", caches),
        }
    }
}

/// Response body for `DELETE /cache/channels/:channel_id`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub channel_id: String,
    pub variant: Variant,
    /// Whether anything was cached for the channel
    pub invalidated: bool,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_response_counts() {
        let resp = DataResponse::new(vec!["a", "b"]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["data"][1], "b");
    }

    #[test]
    fn test_invalidate_response_serialize() {
        let resp = InvalidateResponse {
            channel_id: "UC1".into(),
            variant: Variant::Development,
            invalidated: true,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""channelId":"UC1""#));
        assert!(json.contains(r#""variant":"development""#));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
