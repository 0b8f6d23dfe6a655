// crates/client/src/session.rs
//! Chat session against one agent: rate limiting, generation requests,
//! and history recording in one place.
//!
//! The rate limiter and history store are owned by the session rather
//! than shared process-wide, so their lifecycle ends with the session.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;

use ragline_core::{SseDecoder, StreamEvent, TransportError};

use crate::history::{HistoryStore, Turn};
use crate::rate_limit::RateLimiter;
use crate::transport::HttpTransport;

/// Stream of decoded generation events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, TransportError>> + Send>>;

/// Answer from a non-streaming generation request.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationOutcome {
    pub answer: String,
    pub execution_time_ms: u64,
}

/// The two generation entry points the session needs from the server.
#[async_trait]
pub trait GenerationApi: Send + Sync {
    async fn execute(&self, agent_id: &str, query: &str) -> Result<GenerationOutcome, TransportError>;

    async fn execute_stream(&self, agent_id: &str, query: &str) -> Result<EventStream, TransportError>;
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Denied by the local admission gate; retry after the given delay.
    #[error("Rate limit exceeded, retry in {0:?}")]
    RateLimited(Duration),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server reported a generation failure as a terminal event.
    #[error("Generation failed: {0}")]
    Generation(String),
}

/// One user's conversation with one agent.
pub struct ChatSession<A: GenerationApi> {
    api: Arc<A>,
    agent_id: String,
    limiter: RateLimiter,
    history: HistoryStore,
}

impl<A: GenerationApi> ChatSession<A> {
    pub fn new(api: Arc<A>, agent_id: impl Into<String>, limiter: RateLimiter, history: HistoryStore) -> Self {
        Self {
            api,
            agent_id: agent_id.into(),
            limiter,
            history,
        }
    }

    /// Ask a question and wait for the whole answer.
    pub async fn ask(&self, query: &str) -> Result<String, SessionError> {
        self.admit()?;
        let outcome = self.api.execute(&self.agent_id, query).await?;
        self.record(query, &outcome.answer);
        Ok(outcome.answer)
    }

    /// Ask a question, invoking `on_delta` for each content fragment as it
    /// arrives. Resolves to the full answer once the stream terminates.
    ///
    /// The stream ending without a terminal event is an error, never a
    /// silent completion.
    pub async fn ask_streamed(
        &self,
        query: &str,
        mut on_delta: impl FnMut(&str) + Send,
    ) -> Result<String, SessionError> {
        self.admit()?;
        let mut events = self.api.execute_stream(&self.agent_id, query).await?;

        let mut answer = String::new();
        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Content { content } => {
                    on_delta(&content);
                    answer.push_str(&content);
                }
                StreamEvent::Done { .. } => {
                    self.record(query, &answer);
                    return Ok(answer);
                }
                StreamEvent::Error { error } => {
                    return Err(SessionError::Generation(error));
                }
                StreamEvent::Metadata { .. } | StreamEvent::Context { .. } => {}
            }
        }
        Err(SessionError::Transport(TransportError::UnexpectedEof))
    }

    /// Turns recorded so far for this agent.
    pub fn history(&self) -> Vec<Turn> {
        self.history.load(&self.agent_id)
    }

    pub fn clear_history(&self) {
        if let Err(e) = self.history.clear(&self.agent_id) {
            tracing::warn!(agent_id = %self.agent_id, error = %e, "failed to clear history");
        }
    }

    /// Requests still admissible before the limiter denies.
    pub fn remaining_requests(&self) -> usize {
        self.limiter.remaining()
    }

    fn admit(&self) -> Result<(), SessionError> {
        if self.limiter.try_acquire() {
            Ok(())
        } else {
            Err(SessionError::RateLimited(self.limiter.retry_after()))
        }
    }

    /// History is best-effort: a full disk never fails the question that
    /// was already answered.
    fn record(&self, query: &str, answer: &str) {
        let mut turns = self.history.load(&self.agent_id);
        turns.push(Turn::user(query));
        turns.push(Turn::assistant(answer));
        if let Err(e) = self.history.save(&self.agent_id, &turns) {
            tracing::warn!(agent_id = %self.agent_id, error = %e, "failed to persist history");
        }
    }
}

/// Wire shape of the non-streaming execute response.
#[derive(Debug, Deserialize)]
struct ExecuteBody {
    answer: String,
    execution_time_ms: u64,
}

#[async_trait]
impl GenerationApi for HttpTransport {
    async fn execute(&self, agent_id: &str, query: &str) -> Result<GenerationOutcome, TransportError> {
        let body = self
            .post_json(
                &format!("/api/agents/{agent_id}/execute"),
                &serde_json::json!({ "query": query }),
            )
            .await?;
        let parsed: ExecuteBody = serde_json::from_value(body)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        Ok(GenerationOutcome {
            answer: parsed.answer,
            execution_time_ms: parsed.execution_time_ms,
        })
    }

    async fn execute_stream(&self, agent_id: &str, query: &str) -> Result<EventStream, TransportError> {
        let mut chunks = self
            .post_stream(
                &format!("/api/agents/{agent_id}/execute/stream"),
                &serde_json::json!({ "query": query }),
            )
            .await?;

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = chunks.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(TransportError::PushFailed(e.to_string()));
                        return;
                    }
                };
                for payload in decoder.feed(&chunk) {
                    match serde_json::from_str::<StreamEvent>(&payload) {
                        Ok(event) => yield Ok(event),
                        Err(e) => {
                            yield Err(TransportError::MalformedFrame(e.to_string()));
                            return;
                        }
                    }
                }
            }
            if decoder.has_partial() {
                yield Err(TransportError::UnexpectedEof);
            }
        };
        Ok(Box::pin(stream))
    }
}
