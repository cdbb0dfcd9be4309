//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ServiceState>`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::llm::{extract, ModelDispatcher};
use crate::prompt;
use crate::types::{CoachError, RewriteRequest};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ServiceState {
    pub dispatcher: Arc<dyn ModelDispatcher>,
    /// Model identifier passed to the dispatcher on every rewrite.
    pub model: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub counters: RwLock<RequestCounters>,
}

/// Per-process request accounting. Informational only.
#[derive(Debug, Default, Clone)]
pub struct RequestCounters {
    pub requests: u64,
    pub completed: u64,
    pub failed: u64,
}

impl ServiceState {
    pub fn new(dispatcher: Arc<dyn ModelDispatcher>, model: String) -> Self {
        Self {
            dispatcher,
            model,
            started_at: chrono::Utc::now(),
            counters: RwLock::new(RequestCounters::default()),
        }
    }
}

pub type AppState = Arc<ServiceState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub model: String,
    pub uptime_secs: i64,
    pub requests_received: u64,
    pub rewrites_completed: u64,
    pub requests_failed: u64,
    pub llm_calls: u64,
    pub llm_cost_usd: f64,
    pub est_cost_per_call: f64,
}

// ---------------------------------------------------------------------------
// Error → response mapping
// ---------------------------------------------------------------------------

impl IntoResponse for CoachError {
    fn into_response(self) -> Response {
        let status = match self {
            CoachError::MissingContent => StatusCode::BAD_REQUEST,
            CoachError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/ai/rewriteMemory
pub async fn rewrite_memory(
    State(state): State<AppState>,
    Json(req): Json<RewriteRequest>,
) -> Result<Json<Value>, CoachError> {
    state.counters.write().await.requests += 1;

    let result = handle_rewrite(&state, req).await;

    let mut counters = state.counters.write().await;
    match &result {
        Ok(_) => counters.completed += 1,
        Err(_) => counters.failed += 1,
    }

    result
}

async fn handle_rewrite(
    state: &ServiceState,
    req: RewriteRequest,
) -> Result<Json<Value>, CoachError> {
    if req.content.trim().is_empty() {
        return Err(CoachError::MissingContent);
    }

    let request_id = Uuid::new_v4();
    let prompt = prompt::build_rewrite_prompt(&req.content, &req.tone, &req.agent);

    debug!(
        %request_id,
        tone = %req.tone,
        agent = %req.agent,
        prompt_len = prompt.len(),
        "Dispatching memory rewrite"
    );

    let started = Instant::now();
    let reply = state
        .dispatcher
        .send_to_model(&prompt, &state.model)
        .await
        .map_err(|e| CoachError::Upstream(e.to_string()))?;

    info!(
        %request_id,
        model = %state.model,
        elapsed_ms = started.elapsed().as_millis() as u64,
        tokens = reply.tokens_used,
        cost = format!("${:.4}", reply.cost),
        "Memory rewrite complete"
    );

    let parsed = extract::extract_json_from_text(&reply.content)
        .map_err(|e| CoachError::Upstream(e.to_string()))?;

    Ok(Json(parsed))
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let counters = state.counters.read().await;
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();

    Json(StatusResponse {
        status: "ok".to_string(),
        model: state.model.clone(),
        uptime_secs: uptime,
        requests_received: counters.requests,
        rewrites_completed: counters.completed,
        requests_failed: counters.failed,
        llm_calls: state.dispatcher.total_calls(),
        llm_cost_usd: state.dispatcher.cumulative_cost(),
        est_cost_per_call: state.dispatcher.cost_per_call(),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
