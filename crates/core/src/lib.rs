// crates/core/src/lib.rs
//! Ragline core library.
//!
//! Transport-free domain types shared by the server and the client:
//! job records, generation stream events, the SSE wire codec, and the
//! traits behind which the external collaborators (LLM, retriever,
//! vector index) live.

pub mod error;
pub mod event;
pub mod job;
pub mod llm;
pub mod retrieval;
pub mod sse;

pub use error::{JobError, TransportError};
pub use event::StreamEvent;
pub use job::{JobFrame, JobRecord, JobStatus};
pub use llm::{LlmError, LlmProvider};
pub use retrieval::{IndexStats, IndexWriter, RetrievedDocument, Retriever};
pub use sse::SseDecoder;
