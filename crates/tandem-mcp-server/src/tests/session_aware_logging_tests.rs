//! `logging/setLevel` and `notifications/message` filtered per session

use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use tandem_mcp_protocol::methods::{CallTool, LoggingMessage, SetLevel};
use tandem_mcp_protocol::{CallToolParams, LoggingLevel, LoggingMessageParams, SetLevelParams};
use tandem_mcp_session::{Session, SessionError};

use super::{connect_with, test_client};
use crate::{McpServer, McpServerBuilder, ToolBuilder};

fn chatty_server(builder: McpServerBuilder) -> McpServer {
    let work = ToolBuilder::new("work")
        .execute_with_context(|_args, ctx| async move {
            let info = ctx
                .log(LoggingLevel::Info, "starting work")
                .await
                .map_err(|e| e.to_string())?;
            let error = ctx
                .log(LoggingLevel::Error, json!({"failed": "step 2"}))
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({ "info": info, "error": error }))
        })
        .build()
        .unwrap();
    builder.tool(work).build().unwrap()
}

async fn listening_client(
    server: &McpServer,
) -> (Session, mpsc::UnboundedReceiver<LoggingMessageParams>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = test_client().on::<LoggingMessage, _, _>(move |params, _peer| {
        let _ = tx.send(params);
        async {}
    });
    (connect_with(server, client).await, rx)
}

async fn next_message(
    rx: &mut mpsc::UnboundedReceiver<LoggingMessageParams>,
) -> LoggingMessageParams {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("log message should arrive")
        .expect("channel open")
}

#[tokio::test]
async fn test_messages_follow_session_level() {
    let server = chatty_server(McpServer::builder().with_logging());
    let (client, mut rx) = listening_client(&server).await;

    let result = client
        .send_request::<CallTool>(&CallToolParams::new("work"))
        .await
        .unwrap();
    assert_eq!(result.structured_content, Some(json!({"info": true, "error": true})));
    assert_eq!(next_message(&mut rx).await.level, LoggingLevel::Info);
    let error = next_message(&mut rx).await;
    assert_eq!(error.level, LoggingLevel::Error);
    assert_eq!(error.data, json!({"failed": "step 2"}));

    client
        .send_request::<SetLevel>(&SetLevelParams {
            level: LoggingLevel::Warning,
        })
        .await
        .unwrap();
    let result = client
        .send_request::<CallTool>(&CallToolParams::new("work"))
        .await
        .unwrap();
    assert_eq!(result.structured_content, Some(json!({"info": false, "error": true})));
    assert_eq!(next_message(&mut rx).await.level, LoggingLevel::Error);
}

#[tokio::test]
async fn test_levels_are_independent_per_session() {
    let server = chatty_server(McpServer::builder().with_logging());
    let (quiet, _quiet_rx) = listening_client(&server).await;
    let (loud, mut loud_rx) = listening_client(&server).await;

    quiet
        .send_request::<SetLevel>(&SetLevelParams {
            level: LoggingLevel::Emergency,
        })
        .await
        .unwrap();

    let result = loud
        .send_request::<CallTool>(&CallToolParams::new("work"))
        .await
        .unwrap();
    assert_eq!(result.structured_content, Some(json!({"info": true, "error": true})));
    assert_eq!(next_message(&mut loud_rx).await.level, LoggingLevel::Info);
}

#[tokio::test]
async fn test_logging_without_capability_is_dropped() {
    let server = chatty_server(McpServer::builder());
    let (client, mut rx) = listening_client(&server).await;

    let result = client
        .send_request::<CallTool>(&CallToolParams::new("work"))
        .await
        .unwrap();
    assert_eq!(result.structured_content, Some(json!({"info": false, "error": false})));
    assert!(rx.try_recv().is_err());

    let err = client
        .send_request::<SetLevel>(&SetLevelParams {
            level: LoggingLevel::Debug,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CapabilityNotSupported { .. }));
}
