// crates/core/src/error.rs
use thiserror::Error;

/// Errors raised by the job record store and runner.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid transition for job {job_id}: record is already {status}")]
    InvalidTransition { job_id: String, status: String },

    #[error("Upstream operation failed: {0}")]
    Upstream(String),
}

/// Errors raised on the delivery path between server and client.
///
/// Transport failures are recovered locally (push-to-poll fallback) and
/// only surface to the caller if the fallback path itself fails.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Push channel failed: {0}")]
    PushFailed(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Stream closed before a terminal event")]
    UnexpectedEof,

    #[error("Poll request failed: {0}")]
    PollFailed(String),

    #[error("Timed out after {0} attempts")]
    AttemptsExhausted(u32),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),
}
