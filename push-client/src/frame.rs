//! Inbound frame decoding.
//!
//! The backend pushes one JSON object per notification. It also echoes plain
//! text back to the client, so text that is not JSON is passed through as a
//! JSON string instead of being discarded.

use serde_json::Value;

use crate::error::{Result, TransportError};

/// One decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A notification payload, carried verbatim
    Event(Value),
    /// Transport-level traffic with nothing to deliver
    Keepalive,
}

/// Decode a text frame.
pub fn decode_text(text: &str, max_frame_bytes: usize) -> Result<InboundFrame> {
    if text.len() > max_frame_bytes {
        return Err(TransportError::FrameTooLarge {
            size: text.len(),
            limit: max_frame_bytes,
        });
    }

    if text.trim().is_empty() {
        return Ok(InboundFrame::Keepalive);
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(InboundFrame::Event(value)),
        Err(_) => Ok(InboundFrame::Event(Value::String(text.to_string()))),
    }
}

/// Decode a binary frame, which the backend only uses for UTF-8 JSON.
pub fn decode_binary(data: &[u8], max_frame_bytes: usize) -> Result<InboundFrame> {
    match std::str::from_utf8(data) {
        Ok(text) => decode_text(text, max_frame_bytes),
        Err(_) => {
            tracing::debug!(len = data.len(), "Ignoring non UTF-8 binary frame");
            Ok(InboundFrame::Keepalive)
        }
    }
}
