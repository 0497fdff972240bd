//! # Model Context Protocol payloads
//!
//! Typed payloads for every MCP method the session engine carries, the
//! capability declarations exchanged during `initialize`, and the
//! [`methods`] contracts that bind a wire method name to its params and
//! result types.
//!
//! ## Supported versions
//! - 2024-11-05
//! - 2025-03-26
//! - 2025-06-18 (latest)

pub mod completion;
pub mod content;
pub mod initialize;
pub mod logging;
pub mod meta;
pub mod methods;
pub mod notifications;
pub mod ping;
pub mod prelude;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod tools;
pub mod version;

pub use completion::{CompleteParams, CompleteResult, Completion, CompletionReference};
pub use content::{ContentBlock, ResourceContents, Role};
pub use initialize::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, ServerCapabilities,
};
pub use logging::{LoggingLevel, LoggingMessageParams, SetLevelParams};
pub use meta::{Cursor, PaginatedParams, PaginatedResult, ProgressToken, RequestMeta};
pub use methods::{McpNotification, McpRequest};
pub use notifications::{CancelledParams, ProgressParams, ResourceUpdatedParams};
pub use ping::{EmptyParams, EmptyResult};
pub use prompts::{GetPromptParams, GetPromptResult, Prompt, PromptArgument, PromptMessage};
pub use resources::{ReadResourceResult, Resource, ResourceTemplate, ResourceUriParams};
pub use roots::{ListRootsResult, Root};
pub use sampling::{CreateMessageParams, CreateMessageResult, SamplingMessage};
pub use tools::{CallToolParams, CallToolResult, Tool};
pub use version::McpVersion;

use tandem_mcp_json_rpc::{JsonRpcErrorCode, JsonRpcErrorObject, ToJsonRpcError};

/// Common result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// Handler-level failures, each mapped onto a JSON-RPC error object
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Capability not supported: {0}")]
    CapabilityNotSupported(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionError(String),

    /// An error object received from, or destined verbatim for, the peer
    #[error("JSON-RPC error: {0}")]
    JsonRpc(JsonRpcErrorObject),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<String> for McpError {
    fn from(message: String) -> Self {
        Self::ToolExecutionError(message)
    }
}

impl From<&str> for McpError {
    fn from(message: &str) -> Self {
        Self::ToolExecutionError(message.to_string())
    }
}

impl McpError {
    pub fn missing_param(param: &str) -> Self {
        Self::MissingParameter(param.to_string())
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    pub fn tool_execution(message: &str) -> Self {
        Self::ToolExecutionError(message.to_string())
    }

    /// Convert to a JsonRpcErrorObject for JSON-RPC 2.0 responses
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            McpError::InvalidParameters(_)
            | McpError::MissingParameter(_)
            | McpError::ToolNotFound(_)
            | McpError::PromptNotFound(_)
            | McpError::InvalidCursor(_)
            | McpError::UnsupportedVersion(_) => {
                JsonRpcErrorObject::invalid_params(&self.to_string())
            }

            // MCP reserves -32002 in the server band for unknown resources
            McpError::ResourceNotFound(uri) => JsonRpcErrorObject::new(
                JsonRpcErrorCode::ServerError(-32002),
                Some(self.to_string()),
                Some(serde_json::json!({ "uri": uri })),
            ),

            McpError::CapabilityNotSupported(_) => {
                JsonRpcErrorObject::invalid_request(Some(self.to_string()))
            }

            McpError::JsonRpc(object) => object.clone(),

            McpError::ToolExecutionError(_)
            | McpError::SerializationError(_)
            | McpError::Internal(_) => JsonRpcErrorObject::internal_error(Some(self.to_string())),
        }
    }
}

impl ToJsonRpcError for McpError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        McpError::to_error_object(self)
    }
}
