//! OpenRouter LLM integration.
//!
//! Routes LLM calls through OpenRouter's unified API, giving access to
//! multiple model providers with a single API key. Uses the OpenAI-compatible
//! chat completions format. An optional fallback model is tried when the
//! requested model fails all retries.

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

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default primary model: Claude 4 Sonnet via OpenRouter.
const DEFAULT_PRIMARY_MODEL: &str = "anthropic/claude-sonnet-4";

const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Maximum retries on rate limit / server errors per model attempt.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// Cost tables (approximate per-1K-token pricing via OpenRouter)
// ---------------------------------------------------------------------------

/// Returns (input_cost_per_1k, output_cost_per_1k) for known models.
fn model_costs(model: &str) -> (f64, f64) {
    match model {
        m if m.contains("claude") && m.contains("sonnet") => (0.003, 0.015),
        m if m.contains("claude") && m.contains("opus") => (0.015, 0.075),
        m if m.contains("claude") && m.contains("haiku") => (0.0008, 0.004),
        m if m.contains("grok") => (0.003, 0.015),
        m if m.contains("gpt-4o") => (0.005, 0.015),
        // Conservative default
        _ => (0.005, 0.015),
    }
}

// ---------------------------------------------------------------------------
// API types (OpenAI-compatible)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenRouterClient {
    http: Client,
    api_key: String,
    primary_model: String,
    fallback_model: Option<String>,
    max_tokens: u32,
    total_cost: std::sync::atomic::AtomicU64, // stored as cost * 1_000_000
    total_calls: std::sync::atomic::AtomicU64,
}

impl OpenRouterClient {
    /// Create a new OpenRouter client.
    ///
    /// - `api_key`: OpenRouter API key.
    /// - `primary_model`: Primary model ID (e.g. "anthropic/claude-sonnet-4").
    /// - `fallback_model`: Optional fallback model for when primary fails.
    /// - `max_tokens`: Max output tokens per request.
    pub fn new(
        api_key: String,
        primary_model: Option<String>,
        fallback_model: Option<String>,
        max_tokens: Option<u32>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build OpenRouter HTTP client")?;

        Ok(Self {
            http,
            api_key,
            primary_model: primary_model.unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model,
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_cost: std::sync::atomic::AtomicU64::new(0),
            total_calls: std::sync::atomic::AtomicU64::new(0),
        })
    }

    /// Send a chat completion request to OpenRouter for a specific model,
    /// with retry + exponential backoff.
    async fn call_model(&self, model: &str, user_message: &str) -> Result<(String, u32, f64)> {
        let request = ChatRequest {
            model: model.to_string(),
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, model, "Retrying OpenRouter API call");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(OPENROUTER_API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .header("X-Title", "EDGECOACH Memory Rewrite")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response
                            .json()
                            .await
                            .context("Failed to parse OpenRouter response")?;

                        let text = body
                            .choices
                            .first()
                            .and_then(|c| c.message.as_ref())
                            .map(|m| m.content.clone())
                            .unwrap_or_default();

                        if text.is_empty() {
                            last_error = Some("Empty completion from OpenRouter".to_string());
                            continue;
                        }

                        let usage = body.usage.unwrap_or(ChatUsage {
                            prompt_tokens: 0,
                            completion_tokens: 0,
                        });
                        let total_tokens = usage.prompt_tokens + usage.completion_tokens;
                        let (in_1k, out_1k) = model_costs(model);
                        let cost = (usage.prompt_tokens as f64 / 1000.0) * in_1k
                            + (usage.completion_tokens as f64 / 1000.0) * out_1k;

                        let cost_micro = (cost * 1_000_000.0) as u64;
                        self.total_cost.fetch_add(cost_micro, std::sync::atomic::Ordering::Relaxed);
                        self.total_calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

                        return Ok((text, total_tokens, cost));
                    }

                    // Retryable errors: 429 (rate limit), 500+
                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, model, error = %error_text, "Retryable OpenRouter API error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    // Non-retryable error
                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("OpenRouter API error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(attempt, model, error = %e, "OpenRouter request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "OpenRouter API failed for {} after {} retries: {}",
            model,
            MAX_RETRIES,
            last_error.unwrap_or_default()
        )
    }
}

// ---------------------------------------------------------------------------
// ModelDispatcher implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ModelDispatcher for OpenRouterClient {
    async fn send_to_model(&self, prompt: &str, model: &str) -> Result<ModelReply> {
        debug!(model, prompt_len = prompt.len(), "Dispatching to OpenRouter");

        match self.call_model(model, prompt).await {
            Ok((content, tokens_used, cost)) => Ok(ModelReply {
                content,
                tokens_used,
                cost,
            }),
            Err(primary_err) => {
                let Some(fallback) = self.fallback_model.as_deref().filter(|f| *f != model)
                else {
                    return Err(primary_err);
                };

                warn!(
                    primary = model,
                    fallback,
                    error = %primary_err,
                    "Primary model failed, trying fallback"
                );

                let (content, tokens_used, cost) = self
                    .call_model(fallback, prompt)
                    .await
                    .context("Fallback model also failed")?;

                Ok(ModelReply {
                    content,
                    tokens_used,
                    cost,
                })
            }
        }
    }

    fn cost_per_call(&self) -> f64 {
        // Approximate cost for a typical rewrite
        // ~200 input tokens + ~150 output tokens
        let (in_1k, out_1k) = model_costs(&self.primary_model);
        (200.0 / 1000.0) * in_1k + (150.0 / 1000.0) * out_1k
    }

    fn model_name(&self) -> &str {
        &self.primary_model
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
    fn test_client_construction_defaults() {
        let client = OpenRouterClient::new("key".into(), None, None, None).unwrap();
        assert_eq!(client.model_name(), DEFAULT_PRIMARY_MODEL);
        assert_eq!(client.total_calls(), 0);
    }

    #[test]
    fn test_client_custom_models() {
        let client = OpenRouterClient::new(
            "key".into(),
            Some("anthropic/claude-3-haiku".into()),
            Some("x-ai/grok-4.1-fast".into()),
            Some(512),
        )
        .unwrap();
        assert_eq!(client.model_name(), "anthropic/claude-3-haiku");
        assert_eq!(client.fallback_model.as_deref(), Some("x-ai/grok-4.1-fast"));
    }

    #[test]
    fn test_model_costs_known_models() {
        assert_eq!(model_costs("anthropic/claude-sonnet-4"), (0.003, 0.015));
        assert_eq!(model_costs("anthropic/claude-3-haiku"), (0.0008, 0.004));
        assert_eq!(model_costs("x-ai/grok-4.1-fast"), (0.003, 0.015));
    }

    #[test]
    fn test_model_costs_unknown_model_uses_default() {
        assert_eq!(model_costs("some/unknown-model"), (0.005, 0.015));
    }

    #[test]
    fn test_cost_per_call_positive() {
        let client = OpenRouterClient::new("key".into(), None, None, None).unwrap();
        assert!(client.cost_per_call() > 0.0);
    }

    #[test]
    fn test_chat_response_parses() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "{\"rewritten\": \"x\"}"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 40}
        }"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        let content = resp.choices[0].message.as_ref().unwrap().content.clone();
        assert!(content.contains("rewritten"));
        assert_eq!(resp.usage.unwrap().completion_tokens, 40);
    }

    #[test]
    fn test_chat_response_tolerates_empty_choices() {
        let resp: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.choices.is_empty());
        assert!(resp.usage.is_none());
    }
}
