// crates/server/src/jobs/store.rs
//! In-memory store of job records with per-job fan-out.
//!
//! The store is the single writer boundary: the runner mutates records
//! through it, everything else reads snapshots. Every committed transition
//! is broadcast to that job's subscribers; subscriber churn never blocks
//! a writer (broadcast semantics, send errors ignored).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use ragline_core::{JobError, JobRecord, JobStatus};

/// Capacity of each per-job broadcast channel. A slow subscriber that
/// falls further behind than this sees `Lagged` and resyncs from a
/// snapshot; the runner is never blocked.
const CHANNEL_CAPACITY: usize = 64;

struct JobEntry {
    record: JobRecord,
    tx: broadcast::Sender<JobRecord>,
}

/// Store of every outstanding asynchronous operation.
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, JobEntry>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new record in `pending` and return its initial snapshot.
    pub fn create(&self, job_type: impl Into<String>) -> JobRecord {
        let record = JobRecord::new(job_type);
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let snapshot = record.clone();

        self.with_write(|jobs| {
            jobs.insert(record.job_id, JobEntry { record, tx });
        });

        tracing::info!(job_id = %snapshot.job_id, job_type = %snapshot.job_type, "created job");
        snapshot
    }

    /// Current snapshot of a job.
    pub fn get(&self, job_id: Uuid) -> Result<JobRecord, JobError> {
        self.with_read(|jobs| {
            jobs.get(&job_id)
                .map(|e| e.record.clone())
                .ok_or_else(|| JobError::NotFound(job_id.to_string()))
        })
    }

    /// Atomically fetch the current snapshot and a receiver for all
    /// subsequent transitions. Doing both under one lock guarantees a
    /// subscriber misses nothing between snapshot and first update.
    pub fn subscribe(&self, job_id: Uuid) -> Result<(JobRecord, broadcast::Receiver<JobRecord>), JobError> {
        self.with_read(|jobs| {
            jobs.get(&job_id)
                .map(|e| (e.record.clone(), e.tx.subscribe()))
                .ok_or_else(|| JobError::NotFound(job_id.to_string()))
        })
    }

    /// Record progress for a running job.
    ///
    /// Moves a `pending` record to `running` on first call. Progress is
    /// clamped monotonically: a value below the current one is ignored, so
    /// subscribers always observe a non-decreasing sequence. Calling this
    /// on a terminal record is an error (`InvalidTransition`), not a no-op.
    pub fn update_progress(&self, job_id: Uuid, progress: u8) -> Result<(), JobError> {
        self.mutate(job_id, |record| {
            if record.status == JobStatus::Pending {
                record.status = JobStatus::Running;
                record.started_at = Some(Utc::now());
            }
            record.progress = record.progress.max(progress.min(100));
        })
    }

    /// Transition a job to `completed` with its result. Errors with
    /// `InvalidTransition` if the record is already terminal.
    pub fn complete(&self, job_id: Uuid, result: serde_json::Value) -> Result<(), JobError> {
        let res = self.mutate(job_id, |record| {
            record.status = JobStatus::Completed;
            record.progress = 100;
            record.completed_at = Some(Utc::now());
            record.result = Some(result);
        });
        if res.is_ok() {
            tracing::info!(job_id = %job_id, "job completed");
        }
        res
    }

    /// Transition a job to `failed` with its error message. Errors with
    /// `InvalidTransition` if the record is already terminal.
    pub fn fail(&self, job_id: Uuid, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        let res = self.mutate(job_id, |record| {
            record.status = JobStatus::Failed;
            record.completed_at = Some(Utc::now());
            record.error = Some(error);
        });
        if let Err(ref e) = res {
            tracing::warn!(job_id = %job_id, error = %e, "fail() rejected");
        } else {
            tracing::warn!(job_id = %job_id, "job failed");
        }
        res
    }

    /// Snapshots of all non-terminal jobs.
    pub fn active(&self) -> Vec<JobRecord> {
        self.with_read(|jobs| {
            jobs.values()
                .map(|e| e.record.clone())
                .filter(|r| !r.is_terminal())
                .collect()
        })
    }

    /// Drop terminal records older than `max_age`. Returns how many were
    /// removed. Non-terminal records are never collected.
    pub fn remove_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::hours(24));
        let removed = self.with_write(|jobs| {
            let before = jobs.len();
            jobs.retain(|_, e| !e.record.is_terminal() || e.record.created_at > cutoff);
            before - jobs.len()
        });
        if removed > 0 {
            tracing::info!(removed, "cleaned up old jobs");
        }
        removed
    }

    /// Apply `f` to a non-terminal record and broadcast the new snapshot.
    fn mutate(&self, job_id: Uuid, f: impl FnOnce(&mut JobRecord)) -> Result<(), JobError> {
        self.with_write(|jobs| {
            let entry = jobs
                .get_mut(&job_id)
                .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
            if entry.record.is_terminal() {
                return Err(JobError::InvalidTransition {
                    job_id: job_id.to_string(),
                    status: entry.record.status.to_string(),
                });
            }
            f(&mut entry.record);
            // No subscribers is fine.
            let _ = entry.tx.send(entry.record.clone());
            Ok(())
        })
    }

    fn with_read<T>(&self, f: impl FnOnce(&HashMap<Uuid, JobEntry>) -> T) -> T {
        match self.jobs.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn with_write<T>(&self, f: impl FnOnce(&mut HashMap<Uuid, JobEntry>) -> T) -> T {
        match self.jobs.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_and_get() {
        let store = JobStore::new();
        let record = store.create("index_update");
        assert_eq!(record.status, JobStatus::Pending);

        let snap = store.get(record.job_id).unwrap();
        assert_eq!(snap.job_id, record.job_id);
        assert_eq!(snap.job_type, "index_update");
    }

    #[test]
    fn test_get_unknown_job() {
        let store = JobStore::new();
        assert!(matches!(store.get(Uuid::new_v4()), Err(JobError::NotFound(_))));
    }

    #[test]
    fn test_first_progress_starts_the_job() {
        let store = JobStore::new();
        let record = store.create("index_update");

        store.update_progress(record.job_id, 10).unwrap();
        let snap = store.get(record.job_id).unwrap();
        assert_eq!(snap.status, JobStatus::Running);
        assert_eq!(snap.progress, 10);
        assert!(snap.started_at.is_some());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let store = JobStore::new();
        let record = store.create("index_update");

        store.update_progress(record.job_id, 40).unwrap();
        store.update_progress(record.job_id, 10).unwrap();
        assert_eq!(store.get(record.job_id).unwrap().progress, 40);

        store.update_progress(record.job_id, 75).unwrap();
        assert_eq!(store.get(record.job_id).unwrap().progress, 75);
    }

    #[test]
    fn test_complete_sets_result_and_only_result() {
        let store = JobStore::new();
        let record = store.create("index_update");

        store.complete(record.job_id, json!({"vector_count": 9})).unwrap();
        let snap = store.get(record.job_id).unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert!(snap.completed_at.is_some());
        assert_eq!(snap.result, Some(json!({"vector_count": 9})));
        assert!(snap.error.is_none());
    }

    #[test]
    fn test_fail_sets_error_and_only_error() {
        let store = JobStore::new();
        let record = store.create("index_update");

        store.fail(record.job_id, "backend unreachable").unwrap();
        let snap = store.get(record.job_id).unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("backend unreachable"));
        assert!(snap.result.is_none());
    }

    #[test]
    fn test_second_terminal_call_is_invalid() {
        let store = JobStore::new();
        let record = store.create("index_update");

        store.complete(record.job_id, json!(null)).unwrap();
        assert!(matches!(
            store.complete(record.job_id, json!(null)),
            Err(JobError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.fail(record.job_id, "late"),
            Err(JobError::InvalidTransition { .. })
        ));
        // The winning terminal state is untouched.
        assert_eq!(store.get(record.job_id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_progress_after_terminal_is_invalid() {
        let store = JobStore::new();
        let record = store.create("index_update");
        store.fail(record.job_id, "boom").unwrap();

        assert!(matches!(
            store.update_progress(record.job_id, 50),
            Err(JobError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_subscriber_observes_ordered_transitions() {
        let store = JobStore::new();
        let record = store.create("index_update");
        let (snapshot, mut rx) = store.subscribe(record.job_id).unwrap();
        assert_eq!(snapshot.status, JobStatus::Pending);

        store.update_progress(record.job_id, 10).unwrap();
        store.update_progress(record.job_id, 40).unwrap();
        store.update_progress(record.job_id, 75).unwrap();
        store.complete(record.job_id, json!("R")).unwrap();

        let mut seen = Vec::new();
        while let Ok(update) = rx.recv().await {
            seen.push((update.status, update.progress));
            if update.is_terminal() {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![
                (JobStatus::Running, 10),
                (JobStatus::Running, 40),
                (JobStatus::Running, 75),
                (JobStatus::Completed, 100),
            ]
        );
    }

    #[test]
    fn test_active_excludes_terminal() {
        let store = JobStore::new();
        let a = store.create("index_update");
        let b = store.create("index_update");
        store.complete(a.job_id, json!(null)).unwrap();

        let active = store.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].job_id, b.job_id);
    }

    #[test]
    fn test_cleanup_spares_running_jobs() {
        let store = JobStore::new();
        let done = store.create("index_update");
        let live = store.create("index_update");
        store.complete(done.job_id, json!(null)).unwrap();

        let removed = store.remove_older_than(Duration::from_secs(0));
        assert_eq!(removed, 1);
        assert!(store.get(done.job_id).is_err());
        assert!(store.get(live.job_id).is_ok());
    }
}
