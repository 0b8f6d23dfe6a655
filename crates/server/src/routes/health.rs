// crates/server/src/routes/health.rs
//! Liveness endpoint, with a glance at what the server is busy with.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    /// Jobs currently pending or running.
    active_jobs: usize,
    /// Registered chat agents.
    agents: usize,
}

/// GET /api/health — liveness plus active-job and agent counts.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime_secs(),
        active_jobs: state.jobs.active().len(),
        agents: state.agents.list().len(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
