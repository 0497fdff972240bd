//! # MCP Client Prelude
//!
//! ```rust
//! use tandem_mcp_client::prelude::*;
//! ```

pub use crate::client::{McpClient, McpClientBuilder, PageStream};
pub use crate::config::{ClientConfig, ClientInfo, TimeoutConfig};
pub use crate::error::{McpClientError, McpClientResult};
pub use crate::handlers::SamplingHandler;

pub use tandem_mcp_session::{ChannelTransport, LineTransport, ProgressUpdate, Transport};

// Re-export protocol types for convenience
pub use tandem_mcp_protocol::prelude::*;

pub use std::time::Duration;
