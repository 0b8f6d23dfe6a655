// crates/core/src/job.rs
//! Job record types shared between the server store and the client
//! reconciler. The JSON shape here is the wire format for both the
//! snapshot endpoint and the push-channel frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a background job. Transitions are monotonic:
/// pending → running → (completed | failed), never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal statuses permit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a tracked background job.
///
/// Invariant: once `status` is terminal, exactly one of `result`/`error`
/// is set and the record never changes again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub job_type: String,
    pub status: JobStatus,
    /// 0–100, non-decreasing while the job is non-terminal.
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl JobRecord {
    /// Create a fresh record in `pending` with zero progress.
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            job_type: job_type.into(),
            status: JobStatus::Pending,
            progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One frame on the job push channel: either a full record snapshot or a
/// server-side error report (unknown id, stream timeout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobFrame {
    Record(JobRecord),
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&JobStatus::Failed).unwrap(), "\"failed\"");
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = JobRecord::new("index_update");
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.progress, 0);
        assert!(record.started_at.is_none());
        assert!(record.completed_at.is_none());
        assert!(record.result.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = JobRecord::new("index_update");
        let json = serde_json::to_string(&record).unwrap();
        let back: JobRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id, record.job_id);
        assert_eq!(back.status, JobStatus::Pending);
    }

    #[test]
    fn test_frame_distinguishes_record_from_error() {
        let frame: JobFrame = serde_json::from_str(r#"{"error":"Job not found"}"#).unwrap();
        assert!(matches!(frame, JobFrame::Error { .. }));

        let record = JobRecord::new("index_update");
        let json = serde_json::to_string(&record).unwrap();
        let frame: JobFrame = serde_json::from_str(&json).unwrap();
        assert!(matches!(frame, JobFrame::Record(_)));
    }
}
