//! Wire types for the bridge: line classification, call messages, and the
//! per-call response region.
//!
//! The interpreter classifies its own output with marker prefixes:
//!
//! ```text
//! >> 1 + 1        prompt / command echo
//! => 2            success result (may continue over unprefixed lines)
//! !! Error: x     error result (same continuation rule)
//! anything else   incidental chatter before a result is captured
//! ```
//!
//! The response region mirrors a fixed-capacity shared buffer: a status word
//! (pending=0, success=1, error=2) plus a UTF-8 payload terminated by one NUL
//! byte. Error payloads are the JSON form of
//! [`WireError`](crate::error::WireError).

use crate::config::ProtocolConfig;
use crate::error::{JxaError, Result, WireError};

/// One line of interpreter output, classified into exactly one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyLine {
    /// Prompt or command echo (`>> `).
    Prompt,
    /// Success result (`=> `), payload is the remainder of the line.
    Success(String),
    /// Error result (`!! `), payload is the remainder of the line.
    Error(String),
    /// Any other line: chatter before a result, continuation after one.
    Chatter(String),
}

/// Classify a single line of interpreter output.
pub fn classify(line: &str) -> ReplyLine {
    if line.starts_with(ProtocolConfig::PROMPT_MARKER)
        || line == ProtocolConfig::PROMPT_MARKER.trim_end()
    {
        ReplyLine::Prompt
    } else if let Some(rest) = line.strip_prefix(ProtocolConfig::SUCCESS_MARKER) {
        ReplyLine::Success(rest.to_string())
    } else if let Some(rest) = line.strip_prefix(ProtocolConfig::ERROR_MARKER) {
        ReplyLine::Error(rest.to_string())
    } else {
        ReplyLine::Chatter(line.to_string())
    }
}

/// Request type of a background call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Execute,
    CreateVar,
    Dispose,
}

/// Message sent from the foreground to the background context.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub kind: CallKind,
    pub payload: String,
}

/// Response region status: no result written yet.
pub const STATUS_PENDING: u8 = 0;
/// Response region status: payload is a successful result.
pub const STATUS_SUCCESS: u8 = 1;
/// Response region status: payload is a serialized [`WireError`].
pub const STATUS_ERROR: u8 = 2;

/// Fixed-capacity response region for one blocking round trip.
///
/// Allocated fresh per call and never shared between calls, so no locking is
/// needed. The payload segment holds UTF-8 bytes followed by one NUL
/// terminator; a payload whose encoded length reaches or exceeds the capacity
/// does not fit.
#[derive(Debug)]
pub struct ResponseBuffer {
    status: u8,
    data: Vec<u8>,
}

impl ResponseBuffer {
    /// Allocate a pending response region of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            status: STATUS_PENDING,
            data: vec![0u8; capacity],
        }
    }

    /// Capacity of the payload segment in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Write a successful result into the region.
    ///
    /// Fails with `BufferOverflow` when the encoded result leaves no room for
    /// the terminator byte; the region is left untouched so the caller can
    /// record the overflow via [`write_error`](Self::write_error).
    pub fn write_success(&mut self, result: &str) -> Result<()> {
        let bytes = result.as_bytes();
        if bytes.len() >= self.capacity() {
            return Err(JxaError::buffer_overflow(bytes.len(), self.capacity()));
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.data[bytes.len()] = 0;
        self.status = STATUS_SUCCESS;
        Ok(())
    }

    /// Write an error report into the region.
    ///
    /// A report that would itself overflow is replaced by a capacity-safe
    /// `BufferOverflowError` payload noting the oversized length, so reporting
    /// an overflow can never overflow. As a last resort with a degenerate
    /// capacity the payload is truncated.
    pub fn write_error(&mut self, error: &JxaError) {
        let mut payload = serialize_wire_error(&error.to_wire());
        if payload.len() >= self.capacity() {
            let fallback = WireError {
                kind: "BufferOverflowError".to_string(),
                message: format!(
                    "error report of {} bytes exceeds buffer size {}",
                    payload.len(),
                    self.capacity()
                ),
            };
            payload = serialize_wire_error(&fallback);
            if payload.len() >= self.capacity() {
                payload.truncate(self.capacity().saturating_sub(1));
            }
        }
        self.data[..payload.len()].copy_from_slice(&payload);
        if payload.len() < self.capacity() {
            self.data[payload.len()] = 0;
        }
        self.status = STATUS_ERROR;
    }

    /// Decode the region on the foreground side.
    ///
    /// Success yields the result text; error payloads are reconstructed into
    /// the matching taxonomy member, falling back to a generic failure when
    /// the payload is not parseable.
    pub fn decode(self) -> Result<String> {
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        let payload = String::from_utf8_lossy(&self.data[..end]).into_owned();

        match self.status {
            STATUS_SUCCESS => Ok(payload),
            STATUS_ERROR => match serde_json::from_str::<WireError>(&payload) {
                Ok(wire) => Err(JxaError::from_wire(wire)),
                Err(_) => Err(JxaError::Other(format!(
                    "unparseable error payload: {}",
                    payload
                ))),
            },
            _ => Err(JxaError::Other(
                "response region was never completed".to_string(),
            )),
        }
    }
}

fn serialize_wire_error(wire: &WireError) -> Vec<u8> {
    // WireError is two plain strings; serialization cannot fail.
    serde_json::to_vec(wire).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_marker_lines() {
        assert_eq!(classify(">> 1 + 1"), ReplyLine::Prompt);
        assert_eq!(classify(">> "), ReplyLine::Prompt);
        assert_eq!(classify(">>"), ReplyLine::Prompt);
        assert_eq!(classify("=> 2"), ReplyLine::Success("2".into()));
        assert_eq!(classify("!! Error: x"), ReplyLine::Error("Error: x".into()));
        assert_eq!(classify("log output"), ReplyLine::Chatter("log output".into()));
        assert_eq!(classify(""), ReplyLine::Chatter(String::new()));
    }

    #[test]
    fn test_classify_marker_requires_prefix_position() {
        // A marker in the middle of a line does not classify it.
        assert_eq!(
            classify("value => 2"),
            ReplyLine::Chatter("value => 2".into())
        );
    }

    #[test]
    fn test_success_roundtrip() {
        let mut buf = ResponseBuffer::new(64);
        buf.write_success("2").unwrap();
        assert_eq!(buf.decode().unwrap(), "2");
    }

    #[test]
    fn test_success_preserves_multiline_payload() {
        let mut buf = ResponseBuffer::new(256);
        buf.write_success("function Error() {\n    [function Error]\n}")
            .unwrap();
        let decoded = buf.decode().unwrap();
        assert!(decoded.contains("[function Error]"));
    }

    #[test]
    fn test_error_roundtrip() {
        let mut buf = ResponseBuffer::new(256);
        buf.write_error(&JxaError::ReplExecution {
            message: "Error: x".into(),
        });
        match buf.decode() {
            Err(JxaError::ReplExecution { message }) => assert_eq!(message, "Error: x"),
            other => panic!("Expected ReplExecution, got: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_result_is_rejected() {
        let mut buf = ResponseBuffer::new(16);
        let err = buf.write_success(&"x".repeat(16)).unwrap_err();
        assert!(err.to_string().contains("exceeds buffer size"));
        // The region is still pending; recording the overflow must succeed.
        buf.write_error(&err);
        match buf.decode() {
            Err(JxaError::Other(msg)) => {
                // 16 bytes cannot hold the report either; it degrades to the
                // truncated generic form rather than blocking the caller.
                assert!(!msg.is_empty());
            }
            Err(JxaError::BufferOverflow { .. }) => {}
            other => panic!("Expected an error decode, got: {:?}", other),
        }
    }

    #[test]
    fn test_overflow_report_fits_default_capacity() {
        let mut buf = ResponseBuffer::new(ProtocolConfig::RESPONSE_CAPACITY);
        let err = buf.write_success(&"x".repeat(20_000)).unwrap_err();
        buf.write_error(&err);
        match buf.decode() {
            Err(JxaError::BufferOverflow { message }) => {
                assert!(message.contains("20000"));
                assert!(message.contains("exceeds buffer size 16000"));
            }
            other => panic!("Expected BufferOverflow, got: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_error_report_substitutes_overflow() {
        let mut buf = ResponseBuffer::new(128);
        buf.write_error(&JxaError::ReplExecution {
            message: "e".repeat(500),
        });
        match buf.decode() {
            Err(JxaError::BufferOverflow { message }) => {
                assert!(message.contains("exceeds buffer size 128"));
            }
            other => panic!("Expected BufferOverflow, got: {:?}", other),
        }
    }

    #[test]
    fn test_pending_region_decodes_to_error() {
        let buf = ResponseBuffer::new(64);
        assert!(buf.decode().is_err());
    }
}
