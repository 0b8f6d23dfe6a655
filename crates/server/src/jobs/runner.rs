// crates/server/src/jobs/runner.rs
//! Spawns the long-running work behind a job record.
//!
//! The runner owns the job's task: it creates the record, hands the work
//! closure a [`JobContext`] for progress reporting, and commits the
//! terminal transition from the task's outcome. Subscribers only ever see
//! the store; nothing they do can slow the task down.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use ragline_core::JobRecord;

use super::store::JobStore;

/// Handle given to the work closure for reporting progress and observing
/// cancellation.
#[derive(Clone)]
pub struct JobContext {
    store: Arc<JobStore>,
    job_id: Uuid,
    cancel: CancellationToken,
}

impl JobContext {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Report progress (0–100). Errors are logged, not surfaced: a late
    /// report against an already-terminal record must not crash the task.
    pub fn report_progress(&self, progress: u8) {
        if let Err(e) = self.store.update_progress(self.job_id, progress) {
            tracing::warn!(job_id = %self.job_id, error = %e, "progress report dropped");
        }
    }

    /// Token the work should observe at its own suspension points.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Central runner for all background jobs.
pub struct JobRunner {
    store: Arc<JobStore>,
    cancels: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

impl JobRunner {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self {
            store,
            cancels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a job record and spawn its work.
    ///
    /// `f` resolves to `Ok(result)` or `Err(message)`; the runner commits
    /// the matching terminal transition exactly once. Returns the initial
    /// (`pending`) snapshot so callers can hand out the job id immediately.
    pub fn spawn<F, Fut>(&self, job_type: impl Into<String>, f: F) -> JobRecord
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<serde_json::Value, String>> + Send + 'static,
    {
        let record = self.store.create(job_type);
        let job_id = record.job_id;
        let cancel = CancellationToken::new();

        if let Ok(mut cancels) = self.cancels.write() {
            cancels.insert(job_id, cancel.clone());
        }

        let ctx = JobContext {
            store: Arc::clone(&self.store),
            job_id,
            cancel,
        };
        let store = Arc::clone(&self.store);
        let cancels = Arc::clone(&self.cancels);
        tokio::spawn(async move {
            let outcome = f(ctx).await;
            let commit = match outcome {
                Ok(result) => store.complete(job_id, result),
                Err(message) => store.fail(job_id, message),
            };
            if let Err(e) = commit {
                tracing::error!(job_id = %job_id, error = %e, "terminal commit rejected");
            }
            if let Ok(mut cancels) = cancels.write() {
                cancels.remove(&job_id);
            }
        });

        record
    }

    /// Request cancellation of a running job. Returns false for unknown ids.
    /// Cancellation is cooperative: the work decides how to wind down, and
    /// its `Err` return becomes the job's failure.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        match self.cancels.read() {
            Ok(cancels) => match cancels.get(&job_id) {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::JobStatus;
    use serde_json::json;
    use std::time::Duration;

    async fn wait_terminal(store: &JobStore, job_id: Uuid) -> JobRecord {
        for _ in 0..100 {
            let snap = store.get(job_id).unwrap();
            if snap.is_terminal() {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn test_spawn_completes_with_result() {
        let store = Arc::new(JobStore::new());
        let runner = JobRunner::new(Arc::clone(&store));

        let record = runner.spawn("index_update", |ctx| async move {
            for pct in [25, 50, 75] {
                ctx.report_progress(pct);
            }
            Ok(json!({"vector_count": 3}))
        });

        let snap = wait_terminal(&store, record.job_id).await;
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.result, Some(json!({"vector_count": 3})));
    }

    #[tokio::test]
    async fn test_spawn_failure_surfaces_message() {
        let store = Arc::new(JobStore::new());
        let runner = JobRunner::new(Arc::clone(&store));

        let record = runner.spawn("index_update", |_ctx| async move {
            Err("embedding backend unreachable".to_string())
        });

        let snap = wait_terminal(&store, record.job_id).await;
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("embedding backend unreachable"));
    }

    #[tokio::test]
    async fn test_cancel_is_cooperative() {
        let store = Arc::new(JobStore::new());
        let runner = JobRunner::new(Arc::clone(&store));

        let record = runner.spawn("index_update", |ctx| async move {
            let cancel = ctx.cancellation().clone();
            tokio::select! {
                _ = cancel.cancelled() => Err("cancelled".to_string()),
                _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(json!(null)),
            }
        });

        // Let the task reach its select.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(runner.cancel(record.job_id));

        let snap = wait_terminal(&store, record.job_id).await;
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let store = Arc::new(JobStore::new());
        let runner = JobRunner::new(store);
        assert!(!runner.cancel(Uuid::new_v4()));
    }
}
