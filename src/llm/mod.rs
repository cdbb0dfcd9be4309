//! LLM integration for memory rewriting.
//!
//! Defines the `ModelDispatcher` trait and provides implementations for
//! Claude (Anthropic) and OpenRouter, plus best-effort JSON extraction
//! from free-text model output.

pub mod anthropic;
pub mod extract;
pub mod openrouter;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::ModelReply;

/// Abstraction over LLM backends.
///
/// Implementors send a rendered prompt to a named model and return the raw
/// textual reply together with token usage and cost accounting.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelDispatcher: Send + Sync {
    /// Send a prompt to the named model and return its reply.
    async fn send_to_model(&self, prompt: &str, model: &str) -> Result<ModelReply>;

    /// Approximate cost per individual API call in USD.
    fn cost_per_call(&self) -> f64;

    /// Configured primary model identifier.
    fn model_name(&self) -> &str;

    /// Total cumulative cost across all calls.
    fn cumulative_cost(&self) -> f64;

    /// Total number of API calls made.
    fn total_calls(&self) -> u64;
}
