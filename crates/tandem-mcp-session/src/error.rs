//! Error types for the session engine

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use tandem_mcp_json_rpc::{EncodeError, JsonRpcErrorCode, JsonRpcErrorObject};
use tandem_mcp_protocol::McpError;

use crate::lifecycle::LifecycleState;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Failures of the byte channel underneath a session
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport closed")]
    Closed,

    #[error("Frame contains an embedded newline delimiter")]
    EmbeddedDelimiter,

    /// The offending line has been consumed; the next read starts after it
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,
}

impl TransportError {
    /// True when only the current frame is lost and the channel is still usable
    pub fn is_frame_local(&self) -> bool {
        matches!(self, TransportError::InvalidUtf8)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The peer answered with a JSON-RPC error
    #[error("Remote error (code {code}): {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error(
        "Request cancelled{}",
        .reason.as_ref().map(|r| format!(": {}", r)).unwrap_or_default()
    )]
    Cancelled { reason: Option<String> },

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Request '{method}' timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        state: LifecycleState,
        operation: String,
    },

    #[error("Capability not negotiated for '{method}': requires {requirement}")]
    CapabilityNotSupported { method: String, requirement: String },

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("Handler already registered for '{0}'")]
    DuplicateHandler(String),

    #[error("Method '{0}' is handled by the session engine")]
    ReservedMethod(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    pub fn invalid_state(state: LifecycleState, operation: impl Into<String>) -> Self {
        Self::InvalidState {
            state,
            operation: operation.into(),
        }
    }

    /// Whether retrying the same operation on a fresh attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Rpc { code, .. } => {
                matches!(JsonRpcErrorCode::from_code(*code), JsonRpcErrorCode::ServerError(_))
            }
            _ => false,
        }
    }

    /// JSON-RPC code, when the peer sent one
    pub fn error_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_) | Self::Transport(_))
    }
}

impl From<JsonRpcErrorObject> for SessionError {
    fn from(error: JsonRpcErrorObject) -> Self {
        Self::Rpc {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

/// Lets handlers propagate session failures with `?`
impl From<SessionError> for McpError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Rpc {
                code,
                message,
                data,
            } => McpError::JsonRpc(JsonRpcErrorObject {
                code,
                message,
                data,
            }),
            SessionError::CapabilityNotSupported { method, .. } => {
                McpError::CapabilityNotSupported(method)
            }
            SessionError::Json(e) => McpError::SerializationError(e),
            other => McpError::Internal(other.to_string()),
        }
    }
}
