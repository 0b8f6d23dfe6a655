// crates/core/src/sse.rs
//! Incremental decoder for Server-Sent-Events frames.
//!
//! Transport chunks do not line up with logical events: one delta may span
//! several chunks, and one chunk may carry several events. The decoder
//! buffers bytes across `feed` calls and only releases complete `data:`
//! payloads. Comment lines (keepalives) and blank separators are dropped.

use bytes::{Buf, BytesMut};

/// Stateful SSE line decoder. Feed raw transport chunks, get back the
/// `data:` payloads that completed within them.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: BytesMut,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every payload completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            // Strip the newline (and a preceding \r if present).
            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            if let Some(payload) = Self::parse_line(&line[..end]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// True if bytes remain buffered without a completing newline.
    /// At end-of-stream this means the final frame was truncated.
    pub fn has_partial(&self) -> bool {
        self.buf.has_remaining()
    }

    fn parse_line(line: &[u8]) -> Option<String> {
        // Blank separator or comment/keepalive line.
        if line.is_empty() || line[0] == b':' {
            return None;
        }
        let rest = line.strip_prefix(b"data:")?;
        let rest = rest.strip_prefix(b" ").unwrap_or(rest);
        String::from_utf8(rest.to_vec()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: {\"type\":\"done\"}\n\n");
        assert_eq!(payloads, vec!["{\"type\":\"done\"}".to_string()]);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":\"con").is_empty());
        assert!(decoder.has_partial());
        let payloads = decoder.feed(b"tent\",\"content\":\"hi\"}\n\n");
        assert_eq!(payloads, vec!["{\"type\":\"content\",\"content\":\"hi\"}".to_string()]);
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: a\n\ndata: b\n\ndata: c\n\n");
        assert_eq!(payloads, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_keepalive_comments_dropped() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b": keepalive\n\ndata: x\n\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: x\r\n\r\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn test_truncated_tail_is_reported_partial() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: complete\n\ndata: trunc");
        assert_eq!(payloads, vec!["complete"]);
        assert!(decoder.has_partial());
    }
}
