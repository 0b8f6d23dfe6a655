// crates/server/src/lib.rs
//! Ragline server library.
//!
//! Axum-based HTTP server for the ragline RAG chat backend: background
//! job tracking with SSE push delivery, and streaming agent execution.

pub mod agents;
pub mod chat;
pub mod collaborators;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, jobs, indexes, agents)
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
