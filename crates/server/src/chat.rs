// crates/server/src/chat.rs
//! Generation engine: answers a query against an agent, either as one
//! response or as a typed event stream.
//!
//! The streaming path multiplexes metadata, retrieved context, content
//! deltas and exactly one terminal event onto a single ordered stream.
//! Ordering is enforced here, at the producer, so every consumer can rely
//! on it without re-validating.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_stream::Stream;

use ragline_core::llm::CompletionRequest;
use ragline_core::{LlmProvider, RetrievedDocument, Retriever, StreamEvent};

use crate::agents::AgentRegistry;
use crate::error::{ApiError, ApiResult};

/// How many documents a retrieval call asks for.
const RETRIEVAL_TOP_K: usize = 3;

/// Response shape for a non-streaming execution.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ExecuteResponse {
    pub agent_id: String,
    pub query: String,
    pub answer: String,
    pub context_documents: Option<Vec<RetrievedDocument>>,
    pub execution_time_ms: u64,
}

/// Drives agent lookup, retrieval and the LLM call for both execution modes.
pub struct ChatEngine {
    agents: Arc<AgentRegistry>,
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<dyn Retriever>,
}

impl ChatEngine {
    pub fn new(
        agents: Arc<AgentRegistry>,
        llm: Arc<dyn LlmProvider>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            agents,
            llm,
            retriever,
        }
    }

    /// Execute an agent and return the whole answer at once.
    pub async fn execute(&self, agent_id: &str, query: &str) -> ApiResult<ExecuteResponse> {
        let start = Instant::now();
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| ApiError::AgentNotFound(agent_id.to_string()))?;

        tracing::info!(agent_id, query_len = query.len(), has_rag = agent.has_rag(), "executing agent");

        let context = match &agent.index_name {
            Some(index_name) => Some(
                self.retriever
                    .retrieve(index_name, query, RETRIEVAL_TOP_K)
                    .await?,
            ),
            None => None,
        };

        let request = build_request(&agent.system_instruction, context.as_deref(), query, agent.temperature, agent.max_tokens);
        let completion = self.llm.complete(request).await?;

        Ok(ExecuteResponse {
            agent_id: agent_id.to_string(),
            query: query.to_string(),
            answer: completion.content,
            context_documents: context,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Execute an agent as an ordered event stream.
    ///
    /// Emits `metadata`, then `context` for RAG agents, then content deltas,
    /// then exactly one terminal event. Any upstream failure becomes a
    /// single `error` event; the stream never ends without a terminal.
    pub fn execute_stream(
        &self,
        agent_id: String,
        query: String,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let agents = Arc::clone(&self.agents);
        let llm = Arc::clone(&self.llm);
        let retriever = Arc::clone(&self.retriever);

        async_stream::stream! {
            let start = Instant::now();

            let Some(agent) = agents.get(&agent_id) else {
                yield StreamEvent::Error {
                    error: format!("Agent {agent_id} not found"),
                };
                return;
            };

            yield StreamEvent::Metadata {
                agent_id: agent_id.clone(),
                agent_name: agent.name.clone(),
                has_rag: agent.has_rag(),
            };

            let mut context = None;
            if let Some(index_name) = &agent.index_name {
                match retriever.retrieve(index_name, &query, RETRIEVAL_TOP_K).await {
                    Ok(documents) => {
                        yield StreamEvent::Context {
                            documents: documents.clone(),
                        };
                        context = Some(documents);
                    }
                    Err(e) => {
                        tracing::error!(agent_id, error = %e, "retrieval failed");
                        yield StreamEvent::Error { error: e.to_string() };
                        return;
                    }
                }
            }

            let request = build_request(
                &agent.system_instruction,
                context.as_deref(),
                &query,
                agent.temperature,
                agent.max_tokens,
            );
            let mut tokens = match llm.stream(request).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    tracing::error!(agent_id, error = %e, "LLM stream open failed");
                    yield StreamEvent::Error { error: e.to_string() };
                    return;
                }
            };

            while let Some(delta) = tokens.recv().await {
                match delta {
                    Ok(content) if content.is_empty() => {}
                    Ok(content) => yield StreamEvent::Content { content },
                    Err(e) => {
                        tracing::error!(agent_id, error = %e, "LLM stream failed mid-answer");
                        yield StreamEvent::Error { error: e.to_string() };
                        return;
                    }
                }
            }

            tracing::info!(agent_id, duration_ms = start.elapsed().as_millis() as u64, "stream finished");
            yield StreamEvent::Done {
                execution_time_ms: start.elapsed().as_millis() as u64,
            };
        }
    }
}

/// Stitch the retrieved context into the system instruction, the same way
/// the non-streaming and streaming paths both need it.
fn build_request(
    system_instruction: &str,
    context: Option<&[RetrievedDocument]>,
    query: &str,
    temperature: f32,
    max_tokens: Option<u32>,
) -> CompletionRequest {
    let system_instruction = match context {
        Some(documents) if !documents.is_empty() => {
            let joined: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
            format!("{system_instruction}\n\nContext: {}", joined.join("\n---\n"))
        }
        _ => system_instruction.to_string(),
    };
    CompletionRequest {
        system_instruction,
        prompt: query.to_string(),
        temperature,
        max_tokens,
    }
}
