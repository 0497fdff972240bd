//! Server-initiated notifications: resource updates and list changes

use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use tandem_mcp_protocol::methods::{ResourceUpdated, Subscribe, ToolListChanged, Unsubscribe};
use tandem_mcp_protocol::ResourceUriParams;

use super::{connect, connect_with, test_client};
use crate::{McpServer, TextResource, ToolBuilder};

const README: &str = "file:///readme.md";

fn docs_server() -> McpServer {
    McpServer::builder()
        .resource(TextResource::new(README, "readme", "# Hello"))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_subscribers_receive_resource_updates() {
    let server = docs_server();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = connect_with(
        &server,
        test_client().on::<ResourceUpdated, _, _>(move |params, _peer| {
            let _ = tx.send(params.uri);
            async {}
        }),
    )
    .await;

    client
        .send_request::<Subscribe>(&ResourceUriParams::new(README))
        .await
        .unwrap();
    assert_eq!(server.subscriptions().subscriber_count(README), 1);
    assert_eq!(server.notify_resource_updated(README).await, 1);
    let uri = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(uri.as_deref(), Some(README));

    client
        .send_request::<Unsubscribe>(&ResourceUriParams::new(README))
        .await
        .unwrap();
    assert_eq!(server.notify_resource_updated(README).await, 0);

    // Unsubscribing twice is not an error
    client
        .send_request::<Unsubscribe>(&ResourceUriParams::new(README))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_changed_reaches_operating_sessions() {
    let server = McpServer::builder().with_tools().with_list_changed().build().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _client = connect_with(
        &server,
        test_client().on::<ToolListChanged, _, _>(move |_params, _peer| {
            let _ = tx.send(());
            async {}
        }),
    )
    .await;

    server.add_tool(
        ToolBuilder::new("late")
            .execute(|_args| async { Ok(json!("here")) })
            .build()
            .unwrap(),
    );
    assert_eq!(server.notify_tools_changed().await, 1);
    assert!(timeout(Duration::from_secs(2), rx.recv()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_list_changed_needs_declaration() {
    let server = McpServer::builder().with_tools().build().unwrap();
    let _client = connect(&server).await;

    assert_eq!(server.notify_tools_changed().await, 0);
    assert_eq!(server.notify_prompts_changed().await, 0);
}

#[tokio::test]
async fn test_closed_sessions_are_forgotten() {
    let server = docs_server();
    let client = connect(&server).await;
    client
        .send_request::<Subscribe>(&ResourceUriParams::new(README))
        .await
        .unwrap();
    assert_eq!(server.session_count(), 1);

    client.shutdown().await;

    let forgotten = timeout(Duration::from_secs(2), async {
        while server.session_count() > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(forgotten.is_ok());
    assert_eq!(server.subscriptions().subscriber_count(README), 0);
}
