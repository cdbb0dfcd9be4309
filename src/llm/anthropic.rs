//! Anthropic Claude LLM integration.
//!
//! Implements the `ModelDispatcher` trait using the Anthropic Messages API.
//! Handles rate limiting with exponential backoff and per-call cost
//! tracking.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ModelDispatcher;
use crate::types::ModelReply;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-sonnet";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 1000;

/// Approximate cost per 1K input tokens (Sonnet).
const INPUT_COST_PER_1K: f64 = 0.003;
/// Approximate cost per 1K output tokens (Sonnet).
const OUTPUT_COST_PER_1K: f64 = 0.015;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[serde(default)]
    #[allow(dead_code)]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AnthropicClient {
    http: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    total_cost: std::sync::atomic::AtomicU64, // stored as cost * 1_000_000
    total_calls: std::sync::atomic::AtomicU64,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build Anthropic HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_cost: std::sync::atomic::AtomicU64::new(0),
            total_calls: std::sync::atomic::AtomicU64::new(0),
        })
    }

    /// Send a messages request with retry + backoff.
    async fn call_api(&self, model: &str, user_message: &str) -> Result<(String, u32, f64)> {
        let request = MessagesRequest {
            model: model.to_string(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "Retrying Anthropic API call");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self.http
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: MessagesResponse = response.json().await
                            .context("Failed to parse Anthropic response")?;

                        let text = body.content.iter()
                            .filter_map(|b| b.text.as_deref())
                            .collect::<Vec<_>>()
                            .join("");

                        let usage = body.usage.unwrap_or(Usage {
                            input_tokens: 0,
                            output_tokens: 0,
                        });

                        let total_tokens = usage.input_tokens + usage.output_tokens;
                        let cost = (usage.input_tokens as f64 / 1000.0) * INPUT_COST_PER_1K
                            + (usage.output_tokens as f64 / 1000.0) * OUTPUT_COST_PER_1K;

                        // Track cumulative cost
                        let cost_micro = (cost * 1_000_000.0) as u64;
                        self.total_cost.fetch_add(cost_micro, std::sync::atomic::Ordering::Relaxed);
                        self.total_calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

                        return Ok((text, total_tokens, cost));
                    }

                    // Retryable errors: 429 (rate limit), 500+, 529 (overloaded)
                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, error = %error_text, "Retryable Anthropic API error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    // Non-retryable error
                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("Anthropic API error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Anthropic request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "Anthropic API failed after {} retries: {}",
            MAX_RETRIES,
            last_error.unwrap_or_default()
        )
    }
}

// ---------------------------------------------------------------------------
// ModelDispatcher implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ModelDispatcher for AnthropicClient {
    async fn send_to_model(&self, prompt: &str, model: &str) -> Result<ModelReply> {
        debug!(model, prompt_len = prompt.len(), "Dispatching to Anthropic");

        let (content, tokens_used, cost) = self.call_api(model, prompt).await
            .context("Anthropic API call failed")?;

        Ok(ModelReply {
            content,
            tokens_used,
            cost,
        })
    }

    fn cost_per_call(&self) -> f64 {
        // Approximate cost for a typical rewrite
        // ~200 input tokens + ~150 output tokens
        (200.0 / 1000.0) * INPUT_COST_PER_1K + (150.0 / 1000.0) * OUTPUT_COST_PER_1K
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn cumulative_cost(&self) -> f64 {
        self.total_cost.load(std::sync::atomic::Ordering::Relaxed) as f64 / 1_000_000.0
    }

    fn total_calls(&self) -> u64 {
        self.total_calls.load(std::sync::atomic::Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let client = AnthropicClient::new("test-key".to_string(), None, None).unwrap();
        assert_eq!(client.model_name(), DEFAULT_MODEL);
        assert_eq!(client.cumulative_cost(), 0.0);
        assert_eq!(client.total_calls(), 0);
    }

    #[test]
    fn test_client_custom_model() {
        let client = AnthropicClient::new(
            "test-key".to_string(),
            Some("claude-3-haiku".to_string()),
            Some(2048),
        )
        .unwrap();
        assert_eq!(client.model_name(), "claude-3-haiku");
    }

    #[test]
    fn test_cost_per_call_positive() {
        let client = AnthropicClient::new("key".into(), None, None).unwrap();
        assert!(client.cost_per_call() > 0.0);
    }

    #[test]
    fn test_messages_request_serializes() {
        let request = MessagesRequest {
            model: "claude-3-sonnet".into(),
            max_tokens: 1024,
            messages: vec![Message {
                role: "user".into(),
                content: "rewrite this".into(),
            }],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("claude-3-sonnet"));
        assert!(json.contains("rewrite this"));
    }

    #[test]
    fn test_messages_response_parses() {
        let body = r#"{
            "content": [{"type": "text", "text": "{\"rewritten\": \"x\"}"}],
            "usage": {"input_tokens": 100, "output_tokens": 50}
        }"#;
        let resp: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.content.len(), 1);
        assert_eq!(resp.content[0].text.as_deref(), Some("{\"rewritten\": \"x\"}"));
        assert_eq!(resp.usage.unwrap().input_tokens, 100);
    }

    #[test]
    fn test_messages_response_tolerates_missing_usage() {
        let resp: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(resp.usage.is_none());
    }
}
