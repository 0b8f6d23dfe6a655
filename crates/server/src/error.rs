// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use ragline_core::retrieval::RetrievalError;
use ragline_core::{JobError, LlmError};

/// Structured JSON error response for API errors.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::AgentNotFound(id) => {
                tracing::warn!(agent_id = %id, "agent not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Agent not found", format!("Agent ID: {id}")),
                )
            }
            ApiError::Job(job_err) => match job_err {
                JobError::NotFound(id) => {
                    tracing::warn!(job_id = %id, "job not found");
                    (
                        StatusCode::NOT_FOUND,
                        ErrorResponse::with_details("Job not found", format!("Job ID: {id}")),
                    )
                }
                JobError::InvalidTransition { .. } => (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Invalid job transition", job_err.to_string()),
                ),
                JobError::Upstream(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Job execution failed", job_err.to_string()),
                ),
            },
            ApiError::Retrieval(retrieval_err) => match retrieval_err {
                RetrievalError::IndexNotFound(name) => {
                    tracing::warn!(index_name = %name, "index not found");
                    (
                        StatusCode::NOT_FOUND,
                        ErrorResponse::with_details("Index not found", format!("Index: {name}")),
                    )
                }
                RetrievalError::Backend(_) => {
                    tracing::error!(error = %retrieval_err, "vector store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::with_details("Vector store error", retrieval_err.to_string()),
                    )
                }
            },
            ApiError::Llm(llm_err) => {
                tracing::error!(error = %llm_err, "LLM error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("LLM error", llm_err.to_string()),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
