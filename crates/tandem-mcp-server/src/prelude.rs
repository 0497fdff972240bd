//! Prelude module for common MCP server imports
//!
//! ```rust
//! use tandem_mcp_server::prelude::*;
//! ```

pub use tandem_mcp_protocol::prelude::*;

// Server core types
pub use crate::{McpFrameworkError, McpResult, McpServer, McpServerBuilder, RequestContext};

// Server trait interfaces
pub use crate::{McpCompletion, McpPrompt, McpResource, McpResourceTemplate, McpTool};

// Ready-made implementations
pub use crate::{StaticCompletion, TemplatePrompt, TextResource, ToolBuilder};

// Essential async trait for implementations
pub use async_trait::async_trait;

pub use std::sync::Arc;
