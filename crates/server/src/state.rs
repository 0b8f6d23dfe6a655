// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use ragline_core::{IndexWriter, LlmProvider, Retriever};

use crate::agents::AgentRegistry;
use crate::chat::ChatEngine;
use crate::jobs::{JobRunner, JobStore};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Record store for all outstanding background jobs.
    pub jobs: Arc<JobStore>,
    /// Spawns and tracks the work behind job records.
    pub runner: JobRunner,
    /// Chat agent registry.
    pub agents: Arc<AgentRegistry>,
    /// Generation engine (agent lookup + retrieval + LLM).
    pub chat: ChatEngine,
    /// Vector index mutation collaborator, used by index-update jobs.
    pub index_writer: Arc<dyn IndexWriter>,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    ///
    /// The three collaborators are injected so the whole server can run
    /// against fakes in tests.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retriever: Arc<dyn Retriever>,
        index_writer: Arc<dyn IndexWriter>,
    ) -> Arc<Self> {
        let jobs = Arc::new(JobStore::new());
        let agents = Arc::new(AgentRegistry::new());
        Arc::new(Self {
            start_time: Instant::now(),
            runner: JobRunner::new(Arc::clone(&jobs)),
            jobs,
            chat: ChatEngine::new(Arc::clone(&agents), llm, retriever),
            agents,
            index_writer,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeIndexWriter, FakeLlm, FakeRetriever};

    #[tokio::test]
    async fn test_app_state_new() {
        let state = AppState::new(
            Arc::new(FakeLlm::answering("ok")),
            Arc::new(FakeRetriever::empty()),
            Arc::new(FakeIndexWriter::succeeding()),
        );
        assert!(state.uptime_secs() < 1);
        assert!(state.jobs.active().is_empty());
        assert!(state.agents.list().is_empty());
    }
}
