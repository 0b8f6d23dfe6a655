// crates/core/src/llm/types.rs
//! Request/response/error types for LLM integration.

use thiserror::Error;
use tokio::sync::mpsc;

/// Request for a chat completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Response from a non-streaming completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub latency_ms: u64,
}

/// Incremental token delivery for a streaming completion.
///
/// Each item is one content delta; an `Err` item reports a mid-stream
/// provider failure. The channel closing without an `Err` means the
/// answer finished cleanly.
pub type TokenStream = mpsc::Receiver<Result<String, LlmError>>;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("Provider returned error: {0}")]
    Backend(String),

    #[error("Failed to parse provider response: {0}")]
    ParseFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Timeout(30);
        assert_eq!(err.to_string(), "Timeout after 30 seconds");

        let err = LlmError::Backend("overloaded".to_string());
        assert_eq!(err.to_string(), "Provider returned error: overloaded");
    }
}
