// crates/server/src/routes/agents.rs
//! API routes for chat agents and agent execution.
//!
//! - POST   /agents                       — create an agent
//! - GET    /agents                       — list agents
//! - GET    /agents/{id}                  — get one agent
//! - PUT    /agents/{id}                  — update an agent
//! - DELETE /agents/{id}                  — delete an agent
//! - POST   /agents/{id}/execute          — run a query, full answer
//! - POST   /agents/{id}/execute/stream   — run a query, SSE event stream

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::agents::{AgentConfig, AgentCreate, AgentUpdate};
use crate::chat::ExecuteResponse;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    query: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
struct AgentList {
    agents: Vec<AgentConfig>,
    total: usize,
}

/// POST /api/agents — create a new agent.
async fn create_agent(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<AgentCreate>,
) -> ApiResult<(StatusCode, Json<AgentConfig>)> {
    if spec.name.trim().is_empty() {
        return Err(ApiError::BadRequest("agent name must not be empty".to_string()));
    }
    Ok((StatusCode::CREATED, Json(state.agents.create(spec))))
}

/// GET /api/agents — list all agents.
async fn list_agents(State(state): State<Arc<AppState>>) -> Json<AgentList> {
    let agents = state.agents.list();
    let total = agents.len();
    Json(AgentList { agents, total })
}

/// GET /api/agents/{id} — get one agent.
async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<AgentConfig>> {
    state
        .agents
        .get(&agent_id)
        .map(Json)
        .ok_or(ApiError::AgentNotFound(agent_id))
}

/// PUT /api/agents/{id} — update an agent.
async fn update_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(update): Json<AgentUpdate>,
) -> ApiResult<Json<AgentConfig>> {
    state
        .agents
        .update(&agent_id, update)
        .map(Json)
        .ok_or(ApiError::AgentNotFound(agent_id))
}

/// DELETE /api/agents/{id} — delete an agent.
async fn delete_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.agents.delete(&agent_id) {
        return Err(ApiError::AgentNotFound(agent_id));
    }
    Ok(Json(serde_json::json!({ "message": "agent deleted", "success": true })))
}

/// POST /api/agents/{id}/execute — run a query and return the full answer.
async fn execute_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<Json<ExecuteResponse>> {
    Ok(Json(state.chat.execute(&agent_id, &request.query).await?))
}

/// POST /api/agents/{id}/execute/stream — run a query as an SSE stream.
///
/// Each frame is `data: <json>` with a `type` discriminator
/// (metadata|context|content|done|error). Failures surface as a single
/// terminal `error` event, never as a transport-level error.
async fn execute_agent_stream(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(request): Json<ExecuteRequest>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let events = state.chat.execute_stream(agent_id, request.query);
    let stream = events
        .map(|event| Ok(Event::default().data(serde_json::to_string(&event).unwrap_or_default())));
    Sse::new(stream).keep_alive(KeepAlive::new().text("keepalive"))
}

/// Build the agents router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agents", post(create_agent).get(list_agents))
        .route(
            "/agents/{id}",
            get(get_agent).put(update_agent).delete(delete_agent),
        )
        .route("/agents/{id}/execute", post(execute_agent))
        .route("/agents/{id}/execute/stream", post(execute_agent_stream))
}
