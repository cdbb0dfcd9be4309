//! Core data types for EDGECOACH.
//!
//! Request/response shapes for the rewrite endpoint, the dispatcher
//! reply payload, and the domain error type.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

fn default_tone() -> String {
    "encouraging".to_string()
}

fn default_agent() -> String {
    "general".to_string()
}

/// Body of `POST /api/ai/rewriteMemory`.
///
/// `content` defaults to empty rather than rejecting the payload, so a
/// missing field surfaces as the domain's `MissingContent` error instead
/// of a generic deserialization rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_agent")]
    pub agent: String,
}

/// The nominal shape of a successful rewrite.
///
/// The handler returns the extracted JSON object verbatim; this type is the
/// documented contract and the typed view used by clients and tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewriteResult {
    pub rewritten: String,
    pub tags: Vec<String>,
    pub emoji: String,
}

// ---------------------------------------------------------------------------
// Dispatcher payload
// ---------------------------------------------------------------------------

/// Successful reply from a model dispatcher.
#[derive(Debug, Clone)]
pub struct ModelReply {
    /// Raw text content of the model's response.
    pub content: String,
    /// Total tokens consumed (input + output), 0 when unknown.
    pub tokens_used: u32,
    /// Approximate cost of the call in USD.
    pub cost: f64,
}

impl fmt::Display for ModelReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelReply: {} chars, {} tokens, ${:.4}",
            self.content.len(),
            self.tokens_used,
            self.cost,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for EDGECOACH.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    /// Request arrived without a usable `content` field. Client error.
    #[error("Missing content")]
    MissingContent,

    /// The model dispatcher reported failure, or the reply could not be
    /// parsed. The message is surfaced to the caller verbatim.
    #[error("{0}")]
    Upstream(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
