// crates/server/src/routes/jobs.rs
//! API routes for background job tracking.
//!
//! - GET  /jobs               — list active (non-terminal) jobs
//! - GET  /jobs/{id}          — point-in-time job snapshot
//! - GET  /jobs/{id}/stream   — SSE push channel of job transitions
//! - POST /jobs/{id}/cancel   — request cooperative cancellation

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use ragline_core::JobRecord;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Absolute ceiling on one push connection. A client that still cares
/// after this re-subscribes or falls back to polling.
const STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Keepalive comment interval, so idle connections are not reaped by
/// intermediaries.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// GET /api/jobs — list all active jobs.
async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobRecord>> {
    Json(state.jobs.active())
}

/// GET /api/jobs/{id} — snapshot of one job, 404 on unknown id.
///
/// This is the polling endpoint: a stateless read that always reflects
/// the latest committed state.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobRecord>> {
    Ok(Json(state.jobs.get(job_id)?))
}

/// POST /api/jobs/{id}/cancel — request cancellation of a running job.
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    // Surfaces 404 for ids the store has never seen.
    let record = state.jobs.get(job_id)?;
    if record.is_terminal() {
        return Err(ApiError::Job(ragline_core::JobError::InvalidTransition {
            job_id: job_id.to_string(),
            status: record.status.to_string(),
        }));
    }
    state.runner.cancel(job_id);
    Ok(Json(serde_json::json!({ "job_id": job_id, "message": "cancellation requested" })))
}

/// GET /api/jobs/{id}/stream — SSE push channel for one job.
///
/// Sends the current snapshot immediately, then every transition, and
/// closes after a terminal frame. Unknown ids produce a single
/// `{"error": …}` frame. The connection carries keepalive comments and is
/// capped at an absolute five-minute ceiling.
async fn stream_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    tracing::info!(%job_id, "push subscriber connected");
    let subscription = state.jobs.subscribe(job_id);

    let stream = async_stream::stream! {
        let (snapshot, mut rx) = match subscription {
            Ok(sub) => sub,
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "push subscription rejected");
                yield Ok(error_frame("Job not found"));
                return;
            }
        };

        yield Ok(record_frame(&snapshot));
        if snapshot.is_terminal() {
            return;
        }

        let deadline = tokio::time::Instant::now() + STREAM_TIMEOUT;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(%job_id, "push stream hit absolute timeout");
                    yield Ok(error_frame("Stream timeout"));
                    break;
                }
                update = rx.recv() => match update {
                    Ok(record) => {
                        let terminal = record.is_terminal();
                        yield Ok(record_frame(&record));
                        if terminal {
                            tracing::info!(%job_id, status = %record.status, "push stream closing on terminal");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        // Slow subscriber: resync from the committed snapshot
                        // rather than replaying what it missed. Progress stays
                        // non-decreasing because the record itself is monotonic.
                        tracing::warn!(%job_id, missed = n, "push subscriber lagged, resyncing");
                        match state.jobs.get(job_id) {
                            Ok(record) => {
                                let terminal = record.is_terminal();
                                yield Ok(record_frame(&record));
                                if terminal {
                                    break;
                                }
                            }
                            Err(_) => break,
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEPALIVE_INTERVAL)
            .text("keepalive"),
    )
}

fn record_frame(record: &JobRecord) -> Event {
    Event::default().data(serde_json::to_string(record).unwrap_or_default())
}

fn error_frame(message: &str) -> Event {
    Event::default().data(serde_json::json!({ "error": message }).to_string())
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/stream", get(stream_job))
        .route("/jobs/{id}/cancel", post(cancel_job))
}
