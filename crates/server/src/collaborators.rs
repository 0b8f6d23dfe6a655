// crates/server/src/collaborators.rs
//! Placeholder collaborators for running the server without a configured
//! backend.
//!
//! The job and agent plumbing is fully functional against these; every
//! retrieval, index or LLM call reports the backend as unconfigured, which
//! surfaces on the job record / event stream exactly like any other
//! upstream failure.

use async_trait::async_trait;

use ragline_core::llm::{CompletionRequest, CompletionResponse, LlmError, TokenStream};
use ragline_core::retrieval::RetrievalError;
use ragline_core::{IndexStats, IndexWriter, LlmProvider, RetrievedDocument, Retriever};

/// Stands in for all three collaborators until real backends are wired in.
pub struct UnconfiguredBackend;

const MESSAGE: &str = "no backend configured; set one up before issuing requests";

#[async_trait]
impl LlmProvider for UnconfiguredBackend {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::NotAvailable(MESSAGE.to_string()))
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<TokenStream, LlmError> {
        Err(LlmError::NotAvailable(MESSAGE.to_string()))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

#[async_trait]
impl Retriever for UnconfiguredBackend {
    async fn retrieve(
        &self,
        _index_name: &str,
        _query: &str,
        _k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        Err(RetrievalError::Backend(MESSAGE.to_string()))
    }
}

#[async_trait]
impl IndexWriter for UnconfiguredBackend {
    async fn upsert_document(
        &self,
        _index_name: &str,
        _document_path: &str,
    ) -> Result<IndexStats, RetrievalError> {
        Err(RetrievalError::Backend(MESSAGE.to_string()))
    }
}
