//! Test modules for tandem-mcp-server
//!
//! Every test drives a real server session from a client session over an
//! in-memory transport pair.

use tandem_mcp_protocol::{ClientCapabilities, Implementation};
use tandem_mcp_session::{ChannelTransport, Session, SessionBuilder};

use crate::McpServer;

mod notification_tests;
mod pagination_integration_tests;
mod session_aware_logging_tests;

pub(crate) fn test_client() -> SessionBuilder {
    Session::client(
        Implementation::new("test-client", "1.0.0"),
        ClientCapabilities::default(),
    )
}

/// Serve one session and complete the handshake from `client`
pub(crate) async fn connect_with(server: &McpServer, client: SessionBuilder) -> Session {
    let (client_end, server_end) = ChannelTransport::pair();
    server.serve(server_end).unwrap();
    let client = client.start(client_end).unwrap();
    client.initialize().await.unwrap();
    // The server only counts as operating once `initialized` has been processed
    client.ping().await.unwrap();
    client
}

pub(crate) async fn connect(server: &McpServer) -> Session {
    connect_with(server, test_client()).await
}
