// crates/core/src/retrieval.rs
//! Traits for the vector-store collaborators.
//!
//! Retrieval and index mutation are opaque, fallible, possibly slow
//! operations owned by an external backend. The core only defines the call
//! contract; the server wires in a concrete implementation (or a fake in
//! tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One ranked document returned by a retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Statistics reported after an index mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub index_name: String,
    pub vector_count: u64,
    pub dimension: u32,
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Vector store error: {0}")]
    Backend(String),
}

/// Ranked document retrieval against a named index.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        index_name: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}

/// Vector index mutation. Slow; always run under a tracked job.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    /// Ingest one document into the index, returning updated stats.
    async fn upsert_document(
        &self,
        index_name: &str,
        document_path: &str,
    ) -> Result<IndexStats, RetrievalError>;
}
