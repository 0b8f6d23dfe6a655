// crates/core/src/llm/provider.rs
//! LlmProvider trait defining the interface for LLM integrations.

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse, LlmError, TokenStream};

/// Trait for LLM providers that can answer chat queries.
///
/// The generation path never constructs a provider itself; one is injected
/// into the server state, which keeps the whole path testable with a fake.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run a completion and return the full answer in one piece.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Run a completion, delivering the answer as incremental deltas.
    ///
    /// The returned channel yields deltas in emission order; concatenating
    /// them reproduces exactly what `complete` would have returned.
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, LlmError>;

    /// Provider name for logging/display (e.g. "azure-openai").
    fn name(&self) -> &str;
}
