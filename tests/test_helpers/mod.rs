//! Shared fixtures for the integration tests
//!
//! `RawPeer` drives one end of a [`ChannelTransport`] with hand-written JSON
//! frames, so tests can play a misbehaving or scripted peer against a real
//! session engine on the other end.

use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{sleep, timeout};

use tandem_mcp_protocol::McpVersion;
use tandem_mcp_server::{McpServer, ToolBuilder, number_arg};
use tandem_mcp_session::{ChannelTransport, Session, SessionBuilder, Transport};

/// How long a test waits for a frame that should arrive
pub const FRAME_WAIT: Duration = Duration::from_secs(2);

pub struct RawPeer {
    transport: ChannelTransport,
}

#[allow(dead_code)]
impl RawPeer {
    pub fn new(transport: ChannelTransport) -> Self {
        Self { transport }
    }

    pub async fn send(&self, frame: Value) {
        self.transport.send(frame.to_string()).await.unwrap();
    }

    /// Next frame as JSON. Panics if none arrives within [`FRAME_WAIT`].
    pub async fn recv(&self) -> Value {
        self.recv_within(FRAME_WAIT)
            .await
            .expect("expected a frame from the session")
    }

    /// Next frame, or `None` if the session stays silent for `wait`
    pub async fn recv_within(&self, wait: Duration) -> Option<Value> {
        let frame = timeout(wait, self.transport.receive()).await.ok()?;
        let frame = frame.unwrap().expect("session closed its end");
        Some(serde_json::from_str(&frame).unwrap())
    }

    /// Whether the session has closed its end of the transport
    pub async fn is_closed_by_peer(&self) -> bool {
        matches!(
            timeout(FRAME_WAIT, self.transport.receive()).await,
            Ok(Ok(None)) | Ok(Err(_))
        )
    }

    /// Play the client half of the handshake against a server session
    pub async fn initialize(&self, version: &str) -> Value {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": version,
                "capabilities": {"roots": {"listChanged": true}, "sampling": {}},
                "clientInfo": {"name": "T", "version": "1"}
            }
        }))
        .await;
        let response = self.recv().await;
        self.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        response
    }

    /// Play the server half of the handshake against a client session,
    /// answering with `version`
    pub async fn accept_initialize(&self, version: &str) -> Value {
        let request = self.recv().await;
        assert_eq!(request["method"], "initialize");
        self.send(json!({
            "jsonrpc": "2.0",
            "id": request["id"].clone(),
            "result": {
                "protocolVersion": version,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "scripted", "version": "1"}
            }
        }))
        .await;
        request
    }

    pub async fn close(&self) {
        self.transport.close().await.unwrap();
    }
}

/// Serve one session of `server` and hand back the raw client end
pub fn raw_client_for(server: &McpServer) -> (Session, RawPeer) {
    let (client_end, server_end) = ChannelTransport::pair();
    let session = server.serve(server_end).unwrap();
    (session, RawPeer::new(client_end))
}

/// Start a client session against a scripted server and complete the
/// handshake at the newest version
pub async fn client_against_raw_server(builder: SessionBuilder) -> (Session, RawPeer) {
    let (client_end, server_end) = ChannelTransport::pair();
    let client = builder.start(client_end).unwrap();
    let raw = RawPeer::new(server_end);

    let initializing = {
        let client = client.clone();
        tokio::spawn(async move { client.initialize().await })
    };
    raw.accept_initialize(McpVersion::LATEST.as_str()).await;
    initializing.await.unwrap().unwrap();
    let initialized = raw.recv().await;
    assert_eq!(initialized["method"], "notifications/initialized");
    (client, raw)
}

/// `add`, `divide` and a `slow` tool that honors cancellation
pub fn calculator() -> McpServer {
    let add = ToolBuilder::new("add")
        .description("Add two numbers")
        .number_param("a", "First number")
        .number_param("b", "Second number")
        .execute(|args| async move {
            let sum = number_arg(&args, "a")? + number_arg(&args, "b")?;
            Ok(Value::String(sum.to_string()))
        })
        .build()
        .unwrap();
    let divide = ToolBuilder::new("divide")
        .number_param("a", "Dividend")
        .number_param("b", "Divisor")
        .execute(|args| async move {
            let b = number_arg(&args, "b")?;
            if b == 0.0 {
                return Err("Division by zero is undefined".to_string());
            }
            Ok(Value::String((number_arg(&args, "a")? / b).to_string()))
        })
        .build()
        .unwrap();
    let slow = ToolBuilder::new("slow")
        .number_param("millis", "How long to work")
        .execute_with_context(|args, ctx| async move {
            let millis = number_arg(&args, "millis")? as u64;
            tokio::select! {
                _ = ctx.cancellation.cancelled() => Err("cancelled".to_string()),
                _ = sleep(Duration::from_millis(millis)) => Ok(json!("finished")),
            }
        })
        .build()
        .unwrap();

    McpServer::builder()
        .name("calculator")
        .version("1.0.0")
        .tool(add)
        .tool(divide)
        .tool(slow)
        .build()
        .unwrap()
}
