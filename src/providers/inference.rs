//! Text-generation provider: structured JSON completions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::cost::TokenUsage;
use crate::error::{RelayError, Result};
use crate::providers::http::{build_client, check, decode, require_key};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// A prompt constrained to a JSON schema.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub schema_name: &'static str,
    pub schema: Value,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Parsed JSON content of the first choice
    pub content: Value,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Model name, used for cost bookkeeping.
    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}

// == OpenAI Client ==
pub struct OpenAiClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            api_key,
            model: model.into(),
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "max_completion_tokens": request.max_tokens,
            "temperature": request.temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.schema,
                },
            },
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

/// Extracts and parses the JSON content of the first choice.
fn parse_chat(response: ChatResponse) -> Result<Completion> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RelayError::ParseFailure("No response choices from AI".to_string()))?
        .message
        .content
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| RelayError::ParseFailure("No message content from AI".to_string()))?;

    let content = serde_json::from_str(&content).map_err(|e| {
        RelayError::ParseFailure(format!("Invalid response format from AI: {}", e))
    })?;

    Ok(Completion {
        content,
        usage: response.usage.unwrap_or_default(),
    })
}

#[async_trait]
impl InferenceProvider for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let key = require_key(&self.api_key, "OpenAI")?;
        debug!(schema = request.schema_name, model = %self.model, "chat completion");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&self.body(&request))
            .send()
            .await?;
        let response = check("openai", response).await?;
        parse_chat(decode("openai", response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(value: Value) -> ChatResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_chat_extracts_json_content() {
        let completion = parse_chat(chat(json!({
            "choices": [{ "message": { "content": " {\"results\": []} " } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        })))
        .unwrap();

        assert_eq!(completion.content, json!({ "results": [] }));
        assert_eq!(completion.usage.total(), 15);
    }

    #[test]
    fn test_parse_chat_failures() {
        let no_choices = parse_chat(chat(json!({ "choices": [] })));
        assert!(matches!(no_choices, Err(RelayError::ParseFailure(_))));

        let empty = parse_chat(chat(json!({ "choices": [{ "message": { "content": "  " } }] })));
        assert!(matches!(empty, Err(RelayError::ParseFailure(_))));

        let garbage = parse_chat(chat(json!({ "choices": [{ "message": { "content": "{oops" } }] })));
        assert!(matches!(garbage, Err(RelayError::ParseFailure(_))));
    }

    #[test]
    fn test_request_body_carries_schema() {
        let client = OpenAiClient::new(None, "gpt-4.1-nano", Duration::from_secs(1)).unwrap();
        let body = client.body(&CompletionRequest {
            system: "sys".into(),
            user: "usr".into(),
            schema_name: "channel_analysis",
            schema: json!({ "type": "object" }),
            max_tokens: 800,
            temperature: 0.1,
        });

        assert_eq!(body["model"], "gpt-4.1-nano");
        assert_eq!(body["response_format"]["json_schema"]["name"], "channel_analysis");
        assert_eq!(body["messages"][1]["content"], "usr");
    }

    #[tokio::test]
    async fn test_missing_key_is_internal_error() {
        let client = OpenAiClient::new(None, "gpt-4.1-nano", Duration::from_secs(1)).unwrap();
        let result = client
            .complete(CompletionRequest {
                system: String::new(),
                user: String::new(),
                schema_name: "x",
                schema: json!({}),
                max_tokens: 1,
                temperature: 0.0,
            })
            .await;
        assert!(matches!(result, Err(RelayError::Internal(_))));
    }
}
