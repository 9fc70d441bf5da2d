//! Error types for the JXA bridge.
//!
//! All bridge-side failures belong to the [`JxaError`] family and cross the
//! foreground/background boundary as a [`WireError`] (`{kind, message}`).
//! [`ForeignHandleError`] is deliberately kept outside the family: it signals
//! caller misuse (a handle from another session), not a bridge failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Debug, Error)]
pub enum JxaError {
    /// Submitted code still contained a line break after trimming.
    #[error("{message}")]
    MultiLineCode { message: String },

    /// The interpreter's output stream closed before the call completed.
    ///
    /// Fatal to the bridge: the session must be disposed and cannot retry.
    #[error("REPL output stream ended before the call completed")]
    StreamEnded,

    /// The remote evaluation threw. The session remains usable.
    #[error("REPL execution error: {message}")]
    ReplExecution { message: String },

    /// An encoded result or error report did not fit the response buffer.
    #[error("{message}")]
    BufferOverflow { message: String },

    /// `unwrap` target has no JSON representation (functions, `undefined`, ...).
    ///
    /// Carries the raw textual form for diagnostics.
    #[error("value has no JSON representation: {raw}")]
    NotSerializable { raw: String },

    /// The interpreter process could not be spawned under a pty.
    #[error("failed to spawn interpreter: {message}")]
    Spawn { message: String },

    /// IO error talking to the interpreter.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// JSON error while encoding keys, literals, or wire payloads.
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The session was already disposed.
    #[error("session is disposed")]
    Disposed,

    /// Generic failure, including unrecognized wire kinds.
    #[error("{0}")]
    Other(String),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, JxaError>;

/// Error payload crossing the foreground/background boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub kind: String,
    pub message: String,
}

impl JxaError {
    /// Build the multi-line rejection for a submitted statement.
    pub fn multi_line(code: &str) -> Self {
        JxaError::MultiLineCode {
            message: format!("code contains a line break after trimming: {:?}", code),
        }
    }

    /// Build the overflow error for an encoded result payload.
    pub fn buffer_overflow(length: usize, capacity: usize) -> Self {
        JxaError::BufferOverflow {
            message: format!(
                "encoded result of {} bytes exceeds buffer size {}",
                length, capacity
            ),
        }
    }

    /// Stable kind string used in the error wire format.
    pub fn kind(&self) -> &'static str {
        match self {
            JxaError::MultiLineCode { .. } => "MultiLineCodeError",
            JxaError::StreamEnded => "StreamEndedError",
            JxaError::ReplExecution { .. } => "ReplExecutionError",
            JxaError::BufferOverflow { .. } => "BufferOverflowError",
            JxaError::NotSerializable { .. } => "NotSerializableError",
            JxaError::Spawn { .. } => "SpawnError",
            JxaError::Io { .. } => "IoError",
            JxaError::Json { .. } => "JsonError",
            JxaError::Disposed => "DisposedError",
            JxaError::Other(_) => "BridgeError",
        }
    }

    /// Serialize for the foreground/background boundary.
    pub fn to_wire(&self) -> WireError {
        let message = match self {
            // Message-bearing variants round-trip their inner message so the
            // reconstructed error renders identically on the foreground side.
            JxaError::MultiLineCode { message }
            | JxaError::ReplExecution { message }
            | JxaError::BufferOverflow { message } => message.clone(),
            other => other.to_string(),
        };
        WireError {
            kind: self.kind().to_string(),
            message,
        }
    }

    /// Reconstruct the matching taxonomy member from a wire payload.
    ///
    /// Unrecognized kinds decode to [`JxaError::Other`] preserving the message.
    pub fn from_wire(wire: WireError) -> Self {
        let WireError { kind, message } = wire;
        match kind.as_str() {
            "MultiLineCodeError" => JxaError::MultiLineCode { message },
            "StreamEndedError" => JxaError::StreamEnded,
            "ReplExecutionError" => JxaError::ReplExecution { message },
            "BufferOverflowError" => JxaError::BufferOverflow { message },
            "NotSerializableError" => JxaError::NotSerializable { raw: message },
            "SpawnError" => JxaError::Spawn { message },
            "IoError" => JxaError::Io {
                message,
                source: None,
            },
            "JsonError" => JxaError::Json {
                message,
                source: None,
            },
            "DisposedError" => JxaError::Disposed,
            _ => JxaError::Other(format!("{}: {}", kind, message)),
        }
    }
}

impl From<std::io::Error> for JxaError {
    fn from(err: std::io::Error) -> Self {
        JxaError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for JxaError {
    fn from(err: serde_json::Error) -> Self {
        JxaError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Error returned when a handle from another session is passed to `unwrap`.
///
/// Kept out of the [`JxaError`] family: the bridge did nothing wrong and no
/// remote state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("handle does not belong to this session")]
pub struct ForeignHandleError;

/// Errors surfaced by session-level operations that can reject foreign handles.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Bridge(#[from] JxaError),

    #[error(transparent)]
    ForeignHandle(#[from] ForeignHandleError),
}
