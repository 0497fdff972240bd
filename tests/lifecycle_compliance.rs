//! Handshake ordering, version negotiation and illegal-state requests

mod test_helpers;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing_test::traced_test;

use tandem_mcp_protocol::{ClientCapabilities, Implementation, McpVersion};
use tandem_mcp_session::{
    ChannelTransport, CloseReason, LifecycleState, LineTransport, Session, SessionConfig,
    SessionError,
};

use test_helpers::{FRAME_WAIT, RawPeer, calculator, raw_client_for};

#[tokio::test]
async fn test_request_before_initialize_is_invalid_request() {
    let (_served, raw) = raw_client_for(&calculator());

    raw.send(json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}))
        .await;
    let response = raw.recv().await;

    assert_eq!(response["id"], 7);
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn test_ping_is_allowed_before_initialize() {
    let (served, raw) = raw_client_for(&calculator());

    raw.send(json!({"jsonrpc": "2.0", "id": "p", "method": "ping"}))
        .await;
    assert_eq!(
        raw.recv().await,
        json!({"jsonrpc": "2.0", "id": "p", "result": {}})
    );
    assert_eq!(served.state(), LifecycleState::Uninitialized);
}

#[tokio::test]
async fn test_server_counter_proposes_unknown_version() {
    let (served, raw) = raw_client_for(&calculator());

    let response = raw.initialize("1999-01-01").await;

    assert_eq!(
        response["result"]["protocolVersion"],
        McpVersion::LATEST.as_str()
    );
    raw.send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await;
    assert!(raw.recv().await["result"]["tools"].is_array());
    assert_eq!(served.protocol_version(), Some(McpVersion::LATEST));
}

#[tokio::test]
async fn test_client_closes_on_unsupported_counter_proposal() {
    let (client_end, server_end) = ChannelTransport::pair();
    let config = SessionConfig::default().with_supported_versions(vec![McpVersion::V2024_11_05]);
    let client = Session::client(Implementation::new("T", "1"), ClientCapabilities::default())
        .with_config(config)
        .start(client_end)
        .unwrap();
    let raw = RawPeer::new(server_end);

    let initializing = {
        let client = client.clone();
        tokio::spawn(async move { client.initialize().await })
    };
    let request = raw.accept_initialize("2025-06-18").await;
    assert_eq!(request["params"]["protocolVersion"], "2024-11-05");

    let err = initializing.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::UnsupportedVersion(ref v) if v == "2025-06-18"));
    assert_eq!(
        client.closed().await,
        CloseReason::UnsupportedVersion("2025-06-18".to_string())
    );
    assert!(raw.is_closed_by_peer().await);
}

#[tokio::test]
async fn test_second_initialize_is_rejected() {
    let (_served, raw) = raw_client_for(&calculator());
    raw.initialize("2025-06-18").await;

    raw.send(json!({
        "jsonrpc": "2.0",
        "id": 9,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {"name": "T", "version": "1"}
        }
    }))
    .await;
    let response = raw.recv().await;

    assert_eq!(response["id"], 9);
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn test_requests_wait_for_initialized_notification() {
    let (_served, raw) = raw_client_for(&calculator());
    raw.send(json!({
        "jsonrpc": "2.0",
        "id": 0,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "T", "version": "1"}
        }
    }))
    .await;
    assert_eq!(raw.recv().await["result"]["protocolVersion"], "2025-03-26");

    raw.send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await;
    assert_eq!(raw.recv().await["error"]["code"], -32600);

    raw.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;
    raw.send(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .await;
    assert!(raw.recv().await["result"]["tools"].is_array());
}

#[tokio::test]
async fn test_client_refuses_to_initialize_twice() {
    let (client_end, server_end) = ChannelTransport::pair();
    calculator().serve(server_end).unwrap();
    let client = Session::client(Implementation::new("T", "1"), ClientCapabilities::default())
        .start(client_end)
        .unwrap();

    client.initialize().await.unwrap();
    let err = client.initialize().await.unwrap_err();

    assert!(matches!(err, SessionError::InvalidState { .. }));
    assert_eq!(client.state(), LifecycleState::Operating);
}

#[tokio::test]
async fn test_malformed_frames_leave_the_session_open() {
    let (served, raw) = raw_client_for(&calculator());
    raw.initialize("2025-06-18").await;

    raw.send(json!("not an object")).await;
    raw.send(json!({"jsonrpc": "1.0", "id": 5, "method": "ping"})).await;
    let rejected = raw.recv().await;
    assert_eq!(rejected["id"], 5);
    assert_eq!(rejected["error"]["code"], -32600);

    raw.send(json!({"jsonrpc": "2.0", "id": 6, "method": "ping"})).await;
    assert_eq!(raw.recv().await["id"], 6);
    assert!(served.close_reason().is_none());
}

#[tokio::test]
#[traced_test]
async fn test_non_utf8_line_is_dropped_and_the_session_continues() {
    let (client_io, server_io) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server_io);
    let served = calculator()
        .serve(LineTransport::new(server_read, server_write))
        .unwrap();
    let (client_read, mut client_write) = tokio::io::split(client_io);
    let mut lines = BufReader::new(client_read).lines();

    client_write.write_all(b"\xff\xfe garbage\n").await.unwrap();
    client_write
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .await
        .unwrap();

    let line = timeout(FRAME_WAIT, lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response, json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
    assert!(served.close_reason().is_none());
    assert_eq!(served.state(), LifecycleState::Uninitialized);
    assert!(logs_contain("Dropping unreadable frame"));
}
