//! # MCP Protocol Session Engine
//!
//! Runs one correct JSON-RPC 2.0 session between an MCP client and server
//! over any [`Transport`], independent of which capabilities are in use.
//!
//! ## Components
//! - [`transport`]: frame-level transport trait, line framing and in-memory pairs
//! - [`correlation`]: outstanding request table with exactly-once resolution
//! - [`lifecycle`]: `Uninitialized -> Initializing -> Operating -> ShuttingDown -> Closed`
//! - [`capabilities`]: negotiated capability sets and per-method requirements
//! - [`dispatcher`]: one handler per method, typed or raw
//! - [`cancellation`] and [`progress`]: cooperative cancellation and progress tokens
//! - [`pagination`]: opaque cursor encoding for list operations
//! - [`subscriptions`]: resource subscription fan-out
//!
//! ## Example
//!
//! ```rust,no_run
//! use tandem_mcp_protocol::methods::CallTool;
//! use tandem_mcp_protocol::{CallToolParams, CallToolResult, Implementation, ServerCapabilities};
//! use tandem_mcp_session::{LineTransport, Session};
//!
//! # async fn run() -> tandem_mcp_session::SessionResult<()> {
//! let session = Session::server(
//!     Implementation::new("echo", "1.0.0"),
//!     ServerCapabilities::default().with_tools(false),
//! )
//! .handle::<CallTool, _, _>(|params: CallToolParams, _ctx| async move {
//!     Ok(CallToolResult::text(params.name))
//! })
//! .start(LineTransport::stdio())?;
//!
//! let reason = session.closed().await;
//! eprintln!("session ended: {}", reason);
//! # Ok(())
//! # }
//! ```

pub mod cancellation;
pub mod capabilities;
pub mod config;
pub mod context;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod pagination;
pub mod progress;
pub mod session;
pub mod subscriptions;
pub mod transport;

pub use cancellation::CancellationHandle;
pub use capabilities::{CapabilityRegistry, Requirement};
pub use config::{PaginationConfig, SessionConfig};
pub use context::{Peer, RequestContext};
pub use correlation::{CorrelationTable, Resolution};
pub use dispatcher::{
    Dispatcher, NotificationHandler, RequestHandler, handler_fn, notification_fn,
};
pub use error::{SessionError, SessionResult, TransportError};
pub use lifecycle::{LifecycleState, SessionRole};
pub use pagination::{Page, Paginator};
pub use progress::{ProgressStream, ProgressUpdate};
pub use session::{CloseReason, RequestHandle, RequestOptions, Session, SessionBuilder};
pub use subscriptions::SubscriptionRegistry;
pub use transport::{ChannelTransport, LineTransport, Transport};
