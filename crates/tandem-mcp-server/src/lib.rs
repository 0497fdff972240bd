//! # MCP Server Framework
//!
//! Builds Model Context Protocol servers on top of the tandem session engine.
//! Register tools, resources, prompts and completion providers on an
//! [`McpServerBuilder`]; the built [`McpServer`] serves any transport the
//! session engine accepts, stdio included.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tandem_mcp_server::{McpServer, ToolBuilder, number_arg};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let add = ToolBuilder::new("add")
//!         .description("Add two numbers")
//!         .number_param("a", "First number")
//!         .number_param("b", "Second number")
//!         .execute(|args| async move {
//!             Ok(json!({ "result": number_arg(&args, "a")? + number_arg(&args, "b")? }))
//!         })
//!         .build()?;
//!
//!     let server = McpServer::builder()
//!         .name("calculator")
//!         .version("1.0.0")
//!         .tool(add)
//!         .build()?;
//!
//!     server.run_stdio().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod completion;
pub mod prelude;
pub mod prompt;
pub mod resource;
pub mod server;
pub mod tool;
pub mod uri_template;

#[cfg(test)]
mod tests;

pub use builder::McpServerBuilder;
pub use completion::{McpCompletion, StaticCompletion};
pub use prompt::{McpPrompt, TemplatePrompt};
pub use resource::{McpResource, McpResourceTemplate, TextResource};
pub use server::McpServer;
pub use tool::{DynamicTool, McpTool, ToolBuilder, number_arg, string_arg};
pub use uri_template::UriTemplate;

// Re-export the layers underneath
pub use tandem_mcp_protocol as protocol;
pub use tandem_mcp_session as session;
pub use tandem_mcp_session::{RequestContext, Session, SessionError};

/// Result type for framework operations
pub type Result<T> = std::result::Result<T, McpFrameworkError>;

/// Result type for tool operations - uses structured MCP errors
pub type McpResult<T> = tandem_mcp_protocol::McpResult<T>;

/// Framework-level errors
#[derive(Debug, thiserror::Error)]
pub enum McpFrameworkError {
    #[error("Session error: {0}")]
    Session(#[from] tandem_mcp_session::SessionError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] tandem_mcp_protocol::McpError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
