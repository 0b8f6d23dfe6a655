// crates/server/src/testing.rs
//! Scripted fakes for the external collaborators, shared across the
//! server's unit tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use ragline_core::llm::{CompletionRequest, CompletionResponse, LlmError, TokenStream};
use ragline_core::retrieval::RetrievalError;
use ragline_core::{IndexStats, IndexWriter, LlmProvider, RetrievedDocument, Retriever};

/// LLM fake that plays back a scripted answer or failure.
pub struct FakeLlm {
    deltas: Vec<String>,
    trailing_error: Option<String>,
}

impl FakeLlm {
    /// Answers with a single non-streamed string (streamed as one delta).
    pub fn answering(answer: &str) -> Self {
        Self {
            deltas: vec![answer.to_string()],
            trailing_error: None,
        }
    }

    /// Streams the given deltas in order, then finishes cleanly.
    pub fn streaming(deltas: Vec<&str>) -> Self {
        Self {
            deltas: deltas.into_iter().map(String::from).collect(),
            trailing_error: None,
        }
    }

    /// Streams the given deltas, then fails mid-answer.
    pub fn failing_after(deltas: Vec<&str>, error: &str) -> Self {
        Self {
            deltas: deltas.into_iter().map(String::from).collect(),
            trailing_error: Some(error.to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if let Some(error) = &self.trailing_error {
            return Err(LlmError::Backend(error.clone()));
        }
        Ok(CompletionResponse {
            content: self.deltas.concat(),
            latency_ms: 1,
        })
    }

    async fn stream(&self, _request: CompletionRequest) -> Result<TokenStream, LlmError> {
        let (tx, rx) = mpsc::channel(16);
        let deltas = self.deltas.clone();
        let trailing_error = self.trailing_error.clone();
        tokio::spawn(async move {
            for delta in deltas {
                if tx.send(Ok(delta)).await.is_err() {
                    return;
                }
            }
            if let Some(error) = trailing_error {
                let _ = tx.send(Err(LlmError::Backend(error))).await;
            }
        });
        Ok(rx)
    }

    fn name(&self) -> &str {
        "fake-llm"
    }
}

/// Retriever fake returning fixed documents or a fixed failure.
pub struct FakeRetriever {
    documents: Vec<RetrievedDocument>,
    error: Option<String>,
}

impl FakeRetriever {
    pub fn empty() -> Self {
        Self {
            documents: Vec::new(),
            error: None,
        }
    }

    pub fn with_documents(contents: Vec<&str>) -> Self {
        Self {
            documents: contents
                .into_iter()
                .map(|c| RetrievedDocument {
                    content: c.to_string(),
                    metadata: serde_json::json!({"source": "test"}),
                })
                .collect(),
            error: None,
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            documents: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(
        &self,
        _index_name: &str,
        _query: &str,
        _k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        match &self.error {
            Some(error) => Err(RetrievalError::Backend(error.clone())),
            None => Ok(self.documents.clone()),
        }
    }
}

/// Index writer fake counting upserts, optionally failing on a given path.
pub struct FakeIndexWriter {
    fail_on: Option<String>,
}

impl FakeIndexWriter {
    pub fn succeeding() -> Self {
        Self { fail_on: None }
    }

    pub fn failing_on(path: &str) -> Self {
        Self {
            fail_on: Some(path.to_string()),
        }
    }
}

#[async_trait]
impl IndexWriter for FakeIndexWriter {
    async fn upsert_document(
        &self,
        index_name: &str,
        document_path: &str,
    ) -> Result<IndexStats, RetrievalError> {
        if self.fail_on.as_deref() == Some(document_path) {
            return Err(RetrievalError::Backend(format!(
                "upsert failed for {document_path}"
            )));
        }
        Ok(IndexStats {
            index_name: index_name.to_string(),
            vector_count: 1,
            dimension: 1536,
        })
    }
}
