// crates/core/src/event.rs
//! Typed events carried on a generation stream.

use serde::{Deserialize, Serialize};

use crate::retrieval::RetrievedDocument;

/// One event on a generation stream, discriminated by `type` on the wire.
///
/// A well-formed stream carries at most one `Metadata` (first), at most one
/// `Context` (before any `Content`), any number of `Content` deltas in
/// emission order, and exactly one terminal `Done` or `Error` which closes
/// the stream. Concatenating the deltas in order reproduces the full answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Metadata {
        agent_id: String,
        agent_name: String,
        has_rag: bool,
    },
    Context {
        documents: Vec<RetrievedDocument>,
    },
    Content {
        content: String,
    },
    Done {
        execution_time_ms: u64,
    },
    Error {
        error: String,
    },
}

impl StreamEvent {
    /// Terminal events close the stream; nothing may follow them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_discriminator() {
        let event = StreamEvent::Content {
            content: "hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"content\""));
        assert!(json.contains("\"content\":\"hello\""));
    }

    #[test]
    fn test_metadata_event_round_trip() {
        let json = r#"{"type":"metadata","agent_id":"a1","agent_name":"Support Bot","has_rag":true}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            StreamEvent::Metadata {
                agent_id: "a1".to_string(),
                agent_name: "Support Bot".to_string(),
                has_rag: true,
            }
        );
    }

    #[test]
    fn test_terminality() {
        assert!(StreamEvent::Done { execution_time_ms: 12 }.is_terminal());
        assert!(StreamEvent::Error { error: "boom".to_string() }.is_terminal());
        assert!(!StreamEvent::Content { content: "x".to_string() }.is_terminal());
        assert!(!StreamEvent::Context { documents: vec![] }.is_terminal());
    }
}
