//! Cursor pagination of the list methods across real sessions

use serde_json::json;

use tandem_mcp_protocol::methods::{ListResources, ListTools};
use tandem_mcp_protocol::{Cursor, PaginatedParams};

use super::connect;
use crate::{DynamicTool, McpServer, TextResource, ToolBuilder};

fn numbered_tool(index: usize) -> DynamicTool {
    ToolBuilder::new(format!("tool_{:02}", index))
        .execute(move |_args| async move { Ok(json!(index)) })
        .build()
        .unwrap()
}

fn paged_server(tools: usize, page_size: usize) -> McpServer {
    McpServer::builder()
        .tools((0..tools).map(numbered_tool))
        .page_size(page_size)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_walks_every_page_in_order() {
    let client = connect(&paged_server(5, 2)).await;

    let mut names = Vec::new();
    let mut params = PaginatedParams::first_page();
    let mut pages = 0;
    loop {
        let page = client.send_request::<ListTools>(&params).await.unwrap();
        pages += 1;
        assert!(page.tools.len() <= 2);
        names.extend(page.tools.into_iter().map(|tool| tool.name));
        match page.next_cursor {
            Some(cursor) => params = PaginatedParams::after(cursor),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(names, ["tool_00", "tool_01", "tool_02", "tool_03", "tool_04"]);
}

#[tokio::test]
async fn test_garbage_cursor_is_invalid_params() {
    let client = connect(&paged_server(5, 2)).await;

    let err = client
        .send_request::<ListTools>(&PaginatedParams::after(Cursor("not-a-cursor".into())))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some(-32602));
}

#[tokio::test]
async fn test_cursor_from_another_session_is_rejected() {
    let server = paged_server(5, 2);
    let first = connect(&server).await;
    let second = connect(&server).await;

    let page = first
        .send_request::<ListTools>(&PaginatedParams::first_page())
        .await
        .unwrap();
    let cursor = page.next_cursor.unwrap();

    let err = second
        .send_request::<ListTools>(&PaginatedParams::after(cursor.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some(-32602));

    // Still valid where it was issued
    let next = first
        .send_request::<ListTools>(&PaginatedParams::after(cursor))
        .await
        .unwrap();
    assert_eq!(next.tools[0].name, "tool_02");
}

#[tokio::test]
async fn test_single_page_has_no_cursor() {
    let client = connect(&paged_server(3, 50)).await;

    let page = client
        .send_request::<ListTools>(&PaginatedParams::default())
        .await
        .unwrap();
    assert_eq!(page.tools.len(), 3);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_cursor_from_another_list_is_rejected() {
    let server = (0..5)
        .fold(McpServer::builder().tools((0..5).map(numbered_tool)), |builder, i| {
            builder.resource(TextResource::new(
                format!("file:///doc_{:02}.txt", i),
                format!("doc_{:02}", i),
                "x",
            ))
        })
        .page_size(2)
        .build()
        .unwrap();
    let client = connect(&server).await;

    let resources = client
        .send_request::<ListResources>(&PaginatedParams::first_page())
        .await
        .unwrap();
    let cursor = resources.next_cursor.unwrap();

    let err = client
        .send_request::<ListTools>(&PaginatedParams::after(cursor.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some(-32602));

    let next = client
        .send_request::<ListResources>(&PaginatedParams::after(cursor))
        .await
        .unwrap();
    assert_eq!(next.resources[0].name, "doc_02");
}

#[tokio::test]
async fn test_cursor_rejected_when_a_tool_is_swapped_out() {
    let server = paged_server(5, 2);
    let client = connect(&server).await;

    let page = client
        .send_request::<ListTools>(&PaginatedParams::first_page())
        .await
        .unwrap();
    let cursor = page.next_cursor.unwrap();

    // Same length, different membership
    assert!(server.remove_tool("tool_01"));
    server.add_tool(numbered_tool(9));

    let err = client
        .send_request::<ListTools>(&PaginatedParams::after(cursor))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some(-32602));
}
