// crates/server/src/routes/mod.rs
//! API route handlers for the ragline server.

pub mod agents;
pub mod health;
pub mod indexes;
pub mod jobs;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health                        — health check
/// - GET  /api/jobs                          — list active jobs
/// - GET  /api/jobs/{id}                     — job snapshot (polling endpoint)
/// - GET  /api/jobs/{id}/stream              — SSE push channel of transitions
/// - POST /api/jobs/{id}/cancel              — request job cancellation
/// - POST /api/indexes/{name}/update         — start an index-update job
/// - POST /api/agents                        — create an agent
/// - GET  /api/agents                        — list agents
/// - GET  /api/agents/{id}                   — get one agent
/// - PUT  /api/agents/{id}                   — update an agent
/// - DELETE /api/agents/{id}                 — delete an agent
/// - POST /api/agents/{id}/execute           — run a query, full answer
/// - POST /api/agents/{id}/execute/stream    — run a query, SSE stream
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .nest("/api", indexes::router())
        .nest("/api", agents::router())
        .with_state(state)
}
