//! The high-level client against a real server over an in-memory transport

mod test_helpers;

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use tandem_mcp_client::{McpClient, McpClientBuilder, SamplingHandler};
use tandem_mcp_protocol::methods::CreateMessage;
use tandem_mcp_protocol::{
    CompleteParams, ContentBlock, CreateMessageParams, CreateMessageResult, McpResult, Prompt,
    PromptArgument, ResourceContents, SamplingMessage,
};
use tandem_mcp_server::{
    McpServer, StaticCompletion, TemplatePrompt, TextResource, ToolBuilder, string_arg,
};
use tandem_mcp_session::ChannelTransport;

use test_helpers::FRAME_WAIT;

async fn connect(server: &McpServer, client: McpClientBuilder) -> McpClient {
    let (client_end, server_end) = ChannelTransport::pair();
    server.serve(server_end).unwrap();
    let client = client.connect(client_end).await.unwrap();
    // The server accepts requests of its own only once `initialized` is processed
    client.ping().await.unwrap();
    client
}

struct Shouting;

#[async_trait]
impl SamplingHandler for Shouting {
    async fn create_message(&self, params: CreateMessageParams) -> McpResult<CreateMessageResult> {
        let prompt = params.messages[0].content.as_text().unwrap_or_default();
        Ok(CreateMessageResult::new("shout-1", ContentBlock::text(prompt.to_uppercase())))
    }
}

#[tokio::test]
async fn test_tool_samples_through_the_calling_client() {
    let ask = ToolBuilder::new("ask")
        .string_param("question", "What to ask the model")
        .execute_with_context(|args, ctx| async move {
            let question = string_arg(&args, "question")?;
            let params = CreateMessageParams::new(vec![SamplingMessage::user(question)], 64);
            let reply = ctx
                .peer
                .send_request::<CreateMessage>(&params)
                .await
                .map_err(|e| e.to_string())?;
            let text = reply.content.as_text().unwrap_or_default().to_string();
            Ok(Value::String(format!("{} said {}", reply.model, text)))
        })
        .build()
        .unwrap();
    let server = McpServer::builder().tool(ask).build().unwrap();
    let client = connect(&server, McpClient::builder().with_sampling(Shouting)).await;

    let result = client
        .call_tool("ask", json!({"question": "is it friday"}))
        .await
        .unwrap();

    assert!(!result.is_error());
    assert_eq!(result.text_content(), "shout-1 said IS IT FRIDAY");
}

#[tokio::test]
async fn test_sampling_without_handler_fails_the_tool() {
    let ask = ToolBuilder::new("ask")
        .execute_with_context(|_args, ctx| async move {
            let params = CreateMessageParams::new(vec![SamplingMessage::user("hi")], 8);
            ctx.peer
                .send_request::<CreateMessage>(&params)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!("unreachable"))
        })
        .build()
        .unwrap();
    let server = McpServer::builder().tool(ask).build().unwrap();
    let client = connect(&server, McpClient::builder()).await;

    let result = client.call_tool("ask", Value::Null).await.unwrap();
    assert!(result.is_error());
}

#[tokio::test]
async fn test_subscriptions_are_idempotent() {
    let server = McpServer::builder()
        .resource(TextResource::new("file:///status.txt", "status", "green"))
        .build()
        .unwrap();
    let (updated_tx, mut updated_rx) = mpsc::unbounded_channel();
    let client = connect(
        &server,
        McpClient::builder().on_resource_updated(move |uri| {
            let _ = updated_tx.send(uri);
        }),
    )
    .await;

    client.subscribe("file:///status.txt").await.unwrap();
    client.subscribe("file:///status.txt").await.unwrap();
    assert_eq!(server.notify_resource_updated("file:///status.txt").await, 1);
    let uri = timeout(FRAME_WAIT, updated_rx.recv()).await.unwrap().unwrap();
    assert_eq!(uri, "file:///status.txt");

    client.unsubscribe("file:///status.txt").await.unwrap();
    client.unsubscribe("file:///status.txt").await.unwrap();
    assert_eq!(server.notify_resource_updated("file:///status.txt").await, 0);

    let contents = client.read_resource("file:///status.txt").await.unwrap();
    assert_eq!(contents, vec![ResourceContents::text("file:///status.txt", "green")]);
}

#[tokio::test]
async fn test_tool_list_changes_reach_the_client() {
    let server = McpServer::builder().with_tools().with_list_changed().build().unwrap();
    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel();
    let client = connect(
        &server,
        McpClient::builder().on_tools_changed(move |()| {
            let _ = changed_tx.send(());
        }),
    )
    .await;
    assert!(client.list_tools().await.unwrap().is_empty());

    server.add_tool(
        ToolBuilder::new("upper")
            .string_param("text", "Text")
            .execute(|args| async move {
                Ok(Value::String(string_arg(&args, "text")?.to_uppercase()))
            })
            .build()
            .unwrap(),
    );
    assert_eq!(server.notify_tools_changed().await, 1);
    timeout(FRAME_WAIT, changed_rx.recv()).await.unwrap().unwrap();

    let names: Vec<_> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|tool| tool.name)
        .collect();
    assert_eq!(names, ["upper"]);
    let shouted = client.call_tool("upper", json!({"text": "hey"})).await.unwrap();
    assert_eq!(shouted.content, vec![ContentBlock::text("HEY")]);
}

#[tokio::test]
async fn test_prompt_and_argument_completion() {
    let translate = TemplatePrompt::new(
        Prompt::new("translate")
            .with_description("Translate a phrase")
            .with_arguments(vec![
                PromptArgument::new("phrase").required(),
                PromptArgument::new("language").required(),
            ]),
        "Translate '{phrase}' into {language}",
    );
    let server = McpServer::builder()
        .prompt(translate)
        .completion_provider(StaticCompletion::for_prompt(
            "translate",
            "language",
            ["French", "Finnish", "German"],
        ))
        .build()
        .unwrap();
    let client = connect(&server, McpClient::builder()).await;

    let prompts = client.list_prompts().await.unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].name, "translate");

    let completion = client
        .complete(CompleteParams::prompt("translate", "language", "f"))
        .await
        .unwrap();
    assert_eq!(completion.values, ["French", "Finnish"]);

    let arguments = HashMap::from([
        ("phrase".to_string(), "good morning".to_string()),
        ("language".to_string(), "French".to_string()),
    ]);
    let rendered = client.get_prompt("translate", arguments).await.unwrap();
    assert_eq!(
        rendered.messages[0].content,
        ContentBlock::text("Translate 'good morning' into French")
    );
}

#[tokio::test]
async fn test_disconnect_is_seen_by_the_server() {
    let server = McpServer::builder().with_tools().build().unwrap();
    let client = connect(&server, McpClient::builder()).await;
    assert_eq!(server.session_count(), 1);

    client.disconnect().await;

    let deadline = tokio::time::Instant::now() + FRAME_WAIT;
    while server.session_count() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.session_count(), 0);
    assert!(client.ping().await.is_err());
}
