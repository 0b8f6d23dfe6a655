// crates/server/src/routes/indexes.rs
//! API route that turns an index update into a tracked background job.
//!
//! - POST /indexes/{name}/update — start ingesting documents, returns 202
//!   with the job id to watch.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ragline_core::JobStatus;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct IndexUpdateRequest {
    document_paths: Vec<String>,
}

/// Acknowledgement for an accepted long-running operation.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
struct JobAccepted {
    job_id: Uuid,
    status: JobStatus,
    message: String,
}

/// POST /api/indexes/{name}/update — spawn an index-update job.
///
/// The documents are ingested one by one on the job's own task; progress
/// advances per document and the final index stats become the job result.
/// The handler returns as soon as the record exists.
async fn update_index(
    State(state): State<Arc<AppState>>,
    Path(index_name): Path<String>,
    Json(request): Json<IndexUpdateRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    if request.document_paths.is_empty() {
        return Err(ApiError::BadRequest("document_paths must not be empty".to_string()));
    }

    let writer = Arc::clone(&state.index_writer);
    let paths = request.document_paths;
    let total = paths.len();
    let record = state.runner.spawn("index_update", move |ctx| async move {
        let mut stats = None;
        for (i, path) in paths.iter().enumerate() {
            if ctx.cancellation().is_cancelled() {
                return Err("cancelled".to_string());
            }
            match writer.upsert_document(&index_name, path).await {
                Ok(s) => {
                    stats = Some(s);
                    ctx.report_progress(((i + 1) * 100 / total) as u8);
                }
                Err(e) => return Err(e.to_string()),
            }
        }
        serde_json::to_value(stats).map_err(|e| e.to_string())
    });

    tracing::info!(job_id = %record.job_id, documents = total, "index update accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id: record.job_id,
            status: record.status,
            message: format!("Index update started for {total} documents"),
        }),
    ))
}

/// Build the indexes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/indexes/{name}/update", post(update_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeIndexWriter, FakeLlm, FakeRetriever};
    use axum::body::Body;
    use axum::http::Request;
    use ragline_core::JobRecord;
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(writer: FakeIndexWriter) -> Arc<AppState> {
        AppState::new(
            Arc::new(FakeLlm::answering("ok")),
            Arc::new(FakeRetriever::empty()),
            Arc::new(writer),
        )
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new().nest("/api", router()).with_state(state)
    }

    fn update_request(paths: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/indexes/kb-main/update")
            .header("content-type", "application/json")
            .body(Body::from(json!({"document_paths": paths}).to_string()))
            .unwrap()
    }

    async fn wait_terminal(state: &AppState, job_id: Uuid) -> JobRecord {
        for _ in 0..100 {
            let snap = state.jobs.get(job_id).unwrap();
            if snap.is_terminal() {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn test_update_accepted_and_completes() {
        let state = test_state(FakeIndexWriter::succeeding());
        let response = app(Arc::clone(&state))
            .oneshot(update_request(json!(["a.pdf", "b.pdf"])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let accepted: JobAccepted = serde_json::from_slice(&body).unwrap();
        assert_eq!(accepted.status, JobStatus::Pending);

        let snap = wait_terminal(&state, accepted.job_id).await;
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.result.as_ref().unwrap()["index_name"], "kb-main");
    }

    #[tokio::test]
    async fn test_update_failure_surfaces_on_record() {
        let state = test_state(FakeIndexWriter::failing_on("bad.pdf"));
        let response = app(Arc::clone(&state))
            .oneshot(update_request(json!(["a.pdf", "bad.pdf", "c.pdf"])))
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let accepted: JobAccepted = serde_json::from_slice(&body).unwrap();

        let snap = wait_terminal(&state, accepted.job_id).await;
        assert_eq!(snap.status, JobStatus::Failed);
        assert!(snap.error.unwrap().contains("bad.pdf"));
        assert!(snap.result.is_none());
    }

    #[tokio::test]
    async fn test_update_with_no_documents_is_rejected() {
        let state = test_state(FakeIndexWriter::succeeding());
        let response = app(state)
            .oneshot(update_request(json!([])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
