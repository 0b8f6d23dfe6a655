// crates/client/src/reconciler.rs
//! Push-then-poll reconciler for watching one job.
//!
//! The watcher drives an explicit state machine:
//!
//! ```text
//! AwaitingPush → PushActive ─────────────→ Terminal
//!        │            │ (push error)
//!        └────────────┴──→ Polling ──────→ Terminal
//! ```
//!
//! Only one transport is ever active, enforced by the machine itself. The
//! fallback happens exactly once: any push-channel failure before a
//! terminal frame switches to polling, and the push error is swallowed
//! (logged only) — the poll path is the single user-visible failure
//! surface. Updates arrive on one channel with a tagged terminal variant,
//! so "completion reported twice" is unrepresentable at the type level.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use ragline_core::{JobFrame, JobRecord, TransportError};

use crate::transport::JobTransport;

/// One update observed for a watched job. `Completed` and `Failed` are
/// terminal: the channel closes after either, and exactly one is ever sent.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Progress(JobRecord),
    Completed(serde_json::Value),
    Failed(String),
}

impl JobUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobUpdate::Progress(_))
    }
}

/// Tuning for one watch session.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Interval between polls once fallen back.
    pub poll_interval: Duration,
    /// Poll attempts before the watch fails with a timeout.
    pub max_poll_attempts: u32,
    /// Wall-clock ceiling on the push phase, so a stalled connection
    /// cannot block the fallback indefinitely.
    pub push_timeout: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 90,
            push_timeout: Duration::from_secs(300),
        }
    }
}

/// Handle to a running watch. Dropping it cancels the watch.
pub struct WatchHandle {
    rx: mpsc::Receiver<JobUpdate>,
    cancel: CancellationToken,
}

impl WatchHandle {
    /// Next update, or `None` once the watch is finished or cancelled.
    /// After `cancel()` no update is ever returned, even if one was already
    /// in flight when cancellation happened.
    pub async fn recv(&mut self) -> Option<JobUpdate> {
        if self.cancel.is_cancelled() {
            return None;
        }
        // Cancellation wins over an update that raced into the channel.
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            update = self.rx.recv() => update,
        }
    }

    /// Stop the watch. Idempotent; callable from any state.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Outcome of the push phase, consumed by the state machine driver.
enum PushOutcome {
    /// Terminal frame received; the watch is done.
    Terminal(JobUpdate),
    /// Cancelled mid-push; nothing more may be sent.
    Cancelled,
    /// Push channel failed before a terminal frame; fall back to polling.
    Fallback(TransportError),
}

/// Watches jobs over a [`JobTransport`], reconciling push and poll
/// delivery behind one update channel.
pub struct JobWatcher<T: JobTransport + 'static> {
    transport: Arc<T>,
    config: WatchConfig,
}

impl<T: JobTransport + 'static> JobWatcher<T> {
    pub fn new(transport: Arc<T>, config: WatchConfig) -> Self {
        Self { transport, config }
    }

    /// Start watching a job. The returned handle yields progress updates
    /// and exactly one terminal update, whichever transport delivered it.
    pub fn watch(&self, job_id: Uuid) -> WatchHandle {
        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let session = WatchSession {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            job_id,
            cancel: cancel.clone(),
            tx,
            last_progress: None,
        };
        tokio::spawn(session.run());
        WatchHandle { rx, cancel }
    }
}

struct WatchSession<T: JobTransport> {
    transport: Arc<T>,
    config: WatchConfig,
    job_id: Uuid,
    cancel: CancellationToken,
    tx: mpsc::Sender<JobUpdate>,
    last_progress: Option<u8>,
}

impl<T: JobTransport> WatchSession<T> {
    async fn run(mut self) {
        match self.push_phase().await {
            PushOutcome::Terminal(update) => {
                self.send(update).await;
            }
            PushOutcome::Cancelled => {}
            PushOutcome::Fallback(error) => {
                // The one place a push error is observed, and it goes no
                // further than the log.
                tracing::warn!(job_id = %self.job_id, error = %error, "push channel failed, falling back to polling");
                self.poll_phase().await;
            }
        }
    }

    /// AwaitingPush/PushActive states.
    async fn push_phase(&mut self) -> PushOutcome {
        let deadline = tokio::time::Instant::now() + self.config.push_timeout;

        let mut frames = tokio::select! {
            _ = self.cancel.cancelled() => return PushOutcome::Cancelled,
            opened = tokio::time::timeout_at(deadline, self.transport.subscribe(self.job_id)) => {
                match opened {
                    Err(_) => {
                        return PushOutcome::Fallback(TransportError::Timeout(
                            self.config.push_timeout.as_secs(),
                        ))
                    }
                    Ok(Err(e)) => return PushOutcome::Fallback(e),
                    Ok(Ok(frames)) => frames,
                }
            }
        };

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return PushOutcome::Cancelled,
                _ = tokio::time::sleep_until(deadline) => {
                    return PushOutcome::Fallback(TransportError::Timeout(
                        self.config.push_timeout.as_secs(),
                    ));
                }
                frame = frames.next() => match frame {
                    Some(Ok(JobFrame::Record(record))) => {
                        if record.is_terminal() {
                            return PushOutcome::Terminal(terminal_update(record));
                        }
                        if !self.send_progress(record).await {
                            return PushOutcome::Cancelled;
                        }
                    }
                    // A server-side error frame (unknown job, stream
                    // timeout) is a push failure like any other.
                    Some(Ok(JobFrame::Error { error })) => {
                        return PushOutcome::Fallback(TransportError::PushFailed(error));
                    }
                    Some(Err(e)) => return PushOutcome::Fallback(e),
                    None => return PushOutcome::Fallback(TransportError::UnexpectedEof),
                }
            }
        }
    }

    /// Polling state. Errors here are the user-visible failure path.
    async fn poll_phase(&mut self) {
        for _attempt in 0..self.config.max_poll_attempts {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            let polled = tokio::select! {
                _ = self.cancel.cancelled() => return,
                polled = self.transport.poll(self.job_id) => polled,
            };

            match polled {
                Ok(record) if record.is_terminal() => {
                    self.send(terminal_update(record)).await;
                    return;
                }
                Ok(record) => {
                    if !self.send_progress(record).await {
                        return;
                    }
                }
                Err(e) => {
                    self.send(JobUpdate::Failed(e.to_string())).await;
                    return;
                }
            }
        }

        self.send(JobUpdate::Failed(
            TransportError::AttemptsExhausted(self.config.max_poll_attempts).to_string(),
        ))
        .await;
    }

    /// Forward a non-terminal snapshot, keeping the observed progress
    /// sequence non-decreasing across the transport switch. Returns false
    /// once the watch is cancelled or abandoned.
    async fn send_progress(&mut self, record: JobRecord) -> bool {
        if let Some(last) = self.last_progress {
            if record.progress < last {
                return true;
            }
        }
        self.last_progress = Some(record.progress);
        self.send(JobUpdate::Progress(record)).await
    }

    async fn send(&self, update: JobUpdate) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.send(update).await.is_ok()
    }
}

fn terminal_update(record: JobRecord) -> JobUpdate {
    match record.error {
        Some(error) => JobUpdate::Failed(error),
        // Terminal invariant: completed records carry a result.
        None => JobUpdate::Completed(record.result.unwrap_or(serde_json::Value::Null)),
    }
}
