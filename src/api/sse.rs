//! Server-sent event framing for the chat stream.

use memchr::memchr;

use crate::api::error::summarize_error_body;
use crate::api::StreamChunk;

/// Accumulates raw body bytes and hands out complete lines.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, trimmed. `Err` carries the raw bytes of a line
    /// that was not valid UTF-8; the line is consumed either way.
    pub fn next_line(&mut self) -> Option<Result<String, Vec<u8>>> {
        let newline_pos = memchr(b'\n', &self.buffer)?;
        let raw: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        let line = &raw[..newline_pos];
        Some(match std::str::from_utf8(line) {
            Ok(text) => Ok(text.trim().to_string()),
            Err(_) => Err(line.to_vec()),
        })
    }

    /// Whatever is left after the body ended without a final newline.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Interpretation of one SSE line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Chunk(StreamChunk),
    /// The `[DONE]` sentinel.
    End,
    /// A data payload that is neither a chunk nor an error envelope.
    Malformed(String),
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn decode_payload(payload: &str) -> SseEvent {
    if payload == "[DONE]" {
        return SseEvent::End;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => SseEvent::Chunk(chunk),
        Err(err) => {
            // Some gateways send a bare error envelope instead of an error chunk.
            let is_error_envelope = serde_json::from_str::<serde_json::Value>(payload)
                .ok()
                .is_some_and(|value| value.get("error").is_some());
            if is_error_envelope {
                SseEvent::Chunk(StreamChunk::error(summarize_error_body(payload)))
            } else {
                SseEvent::Malformed(format!("{err}: {payload}"))
            }
        }
    }
}

/// Parse a single line. Comments, event names and blank lines yield `None`.
pub fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let payload = extract_data_payload(line)?;
    if payload.trim().is_empty() {
        return None;
    }
    Some(decode_payload(payload))
}
