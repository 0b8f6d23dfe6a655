// crates/core/src/llm/mod.rs
//! LLM integration module.
//!
//! Provides the `LlmProvider` trait the generation path is written
//! against, plus its request/response/error types. Concrete providers
//! (hosted APIs, local runtimes) live outside the core.

pub mod provider;
pub mod types;

pub use provider::LlmProvider;
pub use types::{CompletionRequest, CompletionResponse, LlmError, TokenStream};
