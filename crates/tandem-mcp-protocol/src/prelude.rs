//! Prelude module for common MCP protocol imports
//!
//! ```rust,no_run
//! use tandem_mcp_protocol::prelude::*;
//! ```

pub use crate::completion::{CompleteParams, CompleteResult, Completion, CompletionReference};
pub use crate::content::{ContentBlock, ResourceContents, Role};
pub use crate::initialize::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, ServerCapabilities,
};
pub use crate::logging::{LoggingLevel, LoggingMessageParams};
pub use crate::meta::{Cursor, PaginatedParams, PaginatedResult, ProgressToken};
pub use crate::methods::{McpNotification, McpRequest};
pub use crate::prompts::{GetPromptParams, GetPromptResult, Prompt, PromptArgument, PromptMessage};
pub use crate::resources::{ReadResourceResult, Resource, ResourceTemplate};
pub use crate::roots::Root;
pub use crate::sampling::{CreateMessageParams, CreateMessageResult, SamplingMessage};
pub use crate::tools::{CallToolParams, CallToolResult, Tool};
pub use crate::{McpError, McpResult, McpVersion};

pub use serde_json::{Value, json};
