//! Email discovery (Apify bulk scraper) and email validation (LeadMagic).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::providers::http::{build_client, check, decode, require_key};

const APIFY_ACTOR_URL: &str =
    "https://api.apify.com/v2/acts/exporter24~youtube-email-bulk-scraper/run-sync-get-dataset-items";
const LEADMAGIC_URL: &str = "https://api.leadmagic.io/email-validate";

// == Email Discovery ==
#[async_trait]
pub trait EmailDiscovery: Send + Sync {
    /// Public contact emails of the given channels, one comma-joined string per
    /// channel that has any.
    async fn discover(&self, channel_ids: &[String]) -> Result<Vec<String>>;
}

pub struct ApifyClient {
    http: Client,
    token: Option<String>,
    url: String,
}

impl ApifyClient {
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            token,
            url: APIFY_ACTOR_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Channel page URL; uploads-playlist ids (`UU…`) are mapped back to `UC…`.
pub fn channel_url(channel_id: &str) -> String {
    let id = match channel_id.strip_prefix("UU") {
        Some(rest) => format!("UC{}", rest),
        None => channel_id.to_string(),
    };
    format!("https://www.youtube.com/channel/{}", id)
}

#[derive(Deserialize)]
struct ScrapedItem {
    #[serde(default)]
    email: Vec<Value>,
}

fn collect_emails(items: Vec<ScrapedItem>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| {
            item.email
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .collect::<Vec<_>>()
                .join(",")
        })
        .filter(|joined| !joined.is_empty())
        .collect()
}

#[async_trait]
impl EmailDiscovery for ApifyClient {
    async fn discover(&self, channel_ids: &[String]) -> Result<Vec<String>> {
        if channel_ids.is_empty() {
            return Ok(Vec::new());
        }
        let token = require_key(&self.token, "Apify")?;
        let urls: Vec<Value> = channel_ids
            .iter()
            .map(|id| json!({ "url": channel_url(id) }))
            .collect();
        debug!(count = urls.len(), "apify email scrape");

        let response = self
            .http
            .post(&self.url)
            .query(&[("token", token)])
            .json(&json!({ "urls": urls }))
            .send()
            .await?;
        let response = check("apify", response).await?;
        let items: Vec<ScrapedItem> = decode("apify", response).await?;
        if items.is_empty() {
            warn!("no items returned from email scrape");
        }
        Ok(collect_emails(items))
    }
}

// == Email Validation ==
/// Validation outcome of one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailVerdict {
    pub valid: bool,
    pub status: String,
    #[serde(default)]
    pub data: Value,
}

impl EmailVerdict {
    pub fn invalid(reason: &str) -> Self {
        Self {
            valid: false,
            status: "invalid".to_string(),
            data: json!({ "error": reason }),
        }
    }
}

#[async_trait]
pub trait EmailValidator: Send + Sync {
    async fn validate(&self, email: &str) -> Result<EmailVerdict>;
}

pub struct LeadMagicClient {
    http: Client,
    api_key: Option<String>,
    url: String,
    accept_catch_all: bool,
}

impl LeadMagicClient {
    pub fn new(api_key: Option<String>, timeout: Duration, accept_catch_all: bool) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            api_key,
            url: LEADMAGIC_URL.to_string(),
            accept_catch_all,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// `valid` always counts; `catch_all` only when accepted.
pub fn verdict_from_status(data: Value, accept_catch_all: bool) -> EmailVerdict {
    let status = data
        .get("email_status")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let valid = status == "valid" || (accept_catch_all && status == "catch_all");
    EmailVerdict {
        valid,
        status,
        data,
    }
}

#[async_trait]
impl EmailValidator for LeadMagicClient {
    async fn validate(&self, email: &str) -> Result<EmailVerdict> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(EmailVerdict::invalid("Empty or invalid email format"));
        }
        let key = require_key(&self.api_key, "LeadMagic")?;

        let response = self
            .http
            .post(&self.url)
            .header("X-API-Key", key)
            .json(&json!({ "email": email }))
            .send()
            .await?;

        // A malformed address is a verdict, not a failure
        if response.status() == StatusCode::BAD_REQUEST {
            let details: Value = response.json().await.unwrap_or(Value::Null);
            return Ok(EmailVerdict {
                valid: false,
                status: "invalid".to_string(),
                data: json!({ "error": "Malformed email address", "details": details }),
            });
        }

        let response = check("leadmagic", response).await?;
        let data: Value = decode("leadmagic", response).await?;
        Ok(verdict_from_status(data, self.accept_catch_all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url_patches_uploads_prefix() {
        assert_eq!(
            channel_url("UUabc"),
            "https://www.youtube.com/channel/UCabc"
        );
        assert_eq!(
            channel_url("UCabc"),
            "https://www.youtube.com/channel/UCabc"
        );
    }

    #[test]
    fn test_collect_emails_joins_and_skips_empty() {
        let items: Vec<ScrapedItem> = serde_json::from_value(json!([
            { "email": [" a@x.com ", "b@x.com"] },
            { "email": [] },
            { "email": ["", 7] },
            {}
        ]))
        .unwrap();

        assert_eq!(collect_emails(items), vec!["a@x.com,b@x.com".to_string()]);
    }

    #[test]
    fn test_catch_all_acceptance() {
        let data = json!({ "email_status": "catch_all" });
        assert!(verdict_from_status(data.clone(), true).valid);
        assert!(!verdict_from_status(data, false).valid);

        let verdict = verdict_from_status(json!({}), true);
        assert_eq!(verdict.status, "unknown");
        assert!(!verdict.valid);
    }

    #[tokio::test]
    async fn test_blank_email_is_invalid_without_a_call() {
        let client = LeadMagicClient::new(None, Duration::from_secs(1), true).unwrap();
        let verdict = client.validate("   ").await.unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.status, "invalid");
    }
}
