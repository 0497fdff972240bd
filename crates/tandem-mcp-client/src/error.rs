//! Error types for MCP client operations

use thiserror::Error;

use tandem_mcp_protocol::McpError;
use tandem_mcp_session::SessionError;

/// Result type for MCP client operations
pub type McpClientResult<T> = Result<T, McpClientError>;

#[derive(Error, Debug)]
pub enum McpClientError {
    /// Anything the session engine reports, including server error responses
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Invalid arguments caught before anything was sent
    #[error("Protocol error: {0}")]
    Protocol(#[from] McpError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl McpClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Session(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::Session(_))
    }

    /// The JSON-RPC error code the server answered with, if any
    pub fn error_code(&self) -> Option<i64> {
        match self {
            Self::Session(e) => e.error_code(),
            _ => None,
        }
    }
}
