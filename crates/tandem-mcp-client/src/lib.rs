//! # MCP Client Library
//!
//! A Model Context Protocol client on top of the `tandem-mcp-session` engine.
//! [`McpClientBuilder::connect`] starts a session on any
//! [`Transport`](tandem_mcp_session::Transport), runs the `initialize`
//! handshake and returns a connected [`McpClient`] with typed calls for every
//! server feature.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tandem_mcp_client::McpClient;
//! use tandem_mcp_session::LineTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = McpClient::builder()
//!         .client_info("inspector", "0.1.0")
//!         .connect(LineTransport::stdio())
//!         .await?;
//!
//!     for tool in client.list_tools().await? {
//!         println!("{}", tool.name);
//!     }
//!     let sum = client.call_tool("add", json!({"a": 2, "b": 3})).await?;
//!     println!("{}", sum.text_content());
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! List methods come in two forms: `list_*` collects every page, while the
//! stream form (`tools()`, `resources()`, ...) requests the next page only
//! when the previous one has been consumed.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod prelude;

pub use client::{McpClient, McpClientBuilder, PageStream};
pub use config::{ClientConfig, ClientInfo, TimeoutConfig};
pub use error::{McpClientError, McpClientResult};
pub use handlers::SamplingHandler;

// Re-export protocol types for convenience
pub use tandem_mcp_protocol as protocol;
