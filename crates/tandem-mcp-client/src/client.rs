//! Main MCP client implementation

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use tandem_mcp_protocol::methods::{
    CallTool, Complete, CreateMessage, GetPrompt, ListPrompts, ListResourceTemplates,
    ListResources, ListRoots, ListTools, ReadResource, RootsListChanged, SetLevel, Subscribe,
    Unsubscribe,
};
use tandem_mcp_protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, CompleteParams, Completion, Cursor,
    EmptyParams, GetPromptParams, GetPromptResult, Implementation, InitializeResult,
    ListRootsResult, LoggingLevel, LoggingMessageParams, McpRequest, McpVersion, PaginatedParams,
    PaginatedResult, Prompt, Resource, ResourceContents, ResourceTemplate, ResourceUriParams, Root,
    ServerCapabilities, SetLevelParams, Tool,
};
use tandem_mcp_session::{
    CloseReason, ProgressStream, ProgressUpdate, RequestOptions, Session, Transport,
};

use crate::config::ClientConfig;
use crate::error::{McpClientError, McpClientResult};
use crate::handlers::{ClientCallbacks, SamplingHandler};

/// Items of a paginated list, fetched a page at a time
pub type PageStream<T> = BoxStream<'static, McpClientResult<T>>;

/// Connected MCP client. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct McpClient {
    session: Session,
    server: Arc<InitializeResult>,
    /// Present when the roots capability was declared
    roots: Option<Arc<RwLock<Vec<Root>>>>,
}

impl McpClient {
    pub fn builder() -> McpClientBuilder {
        McpClientBuilder::new()
    }

    /// The underlying session, for raw requests and notifications
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn server_info(&self) -> &Implementation {
        &self.server.server_info
    }

    pub fn server_capabilities(&self) -> &ServerCapabilities {
        &self.server.capabilities
    }

    pub fn instructions(&self) -> Option<&str> {
        self.server.instructions.as_deref()
    }

    pub fn protocol_version(&self) -> Option<McpVersion> {
        self.session.protocol_version()
    }

    pub async fn ping(&self) -> McpClientResult<()> {
        Ok(self.session.ping().await?)
    }

    /// Every tool, fetching pages lazily as the stream is polled
    pub fn tools(&self) -> PageStream<Tool> {
        self.paginate::<ListTools>()
    }

    pub async fn list_tools(&self) -> McpClientResult<Vec<Tool>> {
        self.tools().try_collect().await
    }

    /// One page of tools, for callers that manage cursors themselves
    pub async fn list_tools_page(
        &self,
        cursor: Option<Cursor>,
    ) -> McpClientResult<tandem_mcp_protocol::tools::ListToolsResult> {
        let params = PaginatedParams { cursor };
        Ok(self.session.send_request::<ListTools>(&params).await?)
    }

    /// Call a tool. A failing tool is not an error here: check
    /// [`CallToolResult::is_error`].
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> McpClientResult<CallToolResult> {
        debug!(tool = name, "Calling tool");
        let result = self
            .session
            .send_request::<CallTool>(&tool_params(name, arguments))
            .await?;
        debug!(tool = name, is_error = result.is_error(), "Tool call completed");
        Ok(result)
    }

    /// Call a tool, passing each progress notification to `on_progress`
    pub async fn call_tool_with_progress<F>(
        &self,
        name: &str,
        arguments: Value,
        mut on_progress: F,
    ) -> McpClientResult<CallToolResult>
    where
        F: FnMut(ProgressUpdate),
    {
        let mut handle = self
            .session
            .send_request_with::<CallTool>(
                &tool_params(name, arguments),
                RequestOptions::new().with_progress(),
            )
            .await?;
        let mut progress = handle.take_progress();
        let response = handle.response_as::<CallToolResult>();
        tokio::pin!(response);

        loop {
            tokio::select! {
                biased;
                Some(update) = next_update(&mut progress) => on_progress(update),
                result = &mut response => return Ok(result?),
            }
        }
    }

    pub fn resources(&self) -> PageStream<Resource> {
        self.paginate::<ListResources>()
    }

    pub async fn list_resources(&self) -> McpClientResult<Vec<Resource>> {
        self.resources().try_collect().await
    }

    pub fn resource_templates(&self) -> PageStream<ResourceTemplate> {
        self.paginate::<ListResourceTemplates>()
    }

    pub async fn list_resource_templates(&self) -> McpClientResult<Vec<ResourceTemplate>> {
        self.resource_templates().try_collect().await
    }

    pub async fn read_resource(&self, uri: &str) -> McpClientResult<Vec<ResourceContents>> {
        debug!(uri = uri, "Reading resource");
        let result = self
            .session
            .send_request::<ReadResource>(&ResourceUriParams::new(uri))
            .await?;
        Ok(result.contents)
    }

    /// Ask for `notifications/resources/updated` about `uri`
    pub async fn subscribe(&self, uri: &str) -> McpClientResult<()> {
        self.session
            .send_request::<Subscribe>(&ResourceUriParams::new(uri))
            .await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, uri: &str) -> McpClientResult<()> {
        self.session
            .send_request::<Unsubscribe>(&ResourceUriParams::new(uri))
            .await?;
        Ok(())
    }

    pub fn prompts(&self) -> PageStream<Prompt> {
        self.paginate::<ListPrompts>()
    }

    pub async fn list_prompts(&self) -> McpClientResult<Vec<Prompt>> {
        self.prompts().try_collect().await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> McpClientResult<GetPromptResult> {
        debug!(prompt = name, "Getting prompt");
        let params = GetPromptParams::new(name).with_arguments(arguments);
        Ok(self.session.send_request::<GetPrompt>(&params).await?)
    }

    pub async fn complete(&self, params: CompleteParams) -> McpClientResult<Completion> {
        let result = self.session.send_request::<Complete>(&params).await?;
        Ok(result.completion)
    }

    /// Minimum level of `notifications/message` the server should send
    pub async fn set_log_level(&self, level: LoggingLevel) -> McpClientResult<()> {
        self.session
            .send_request::<SetLevel>(&SetLevelParams { level })
            .await?;
        Ok(())
    }

    /// Roots currently offered to the server
    pub fn roots(&self) -> Vec<Root> {
        self.roots
            .as_ref()
            .map(|roots| roots.read().clone())
            .unwrap_or_default()
    }

    /// Replace the roots and send `notifications/roots/list_changed`
    pub async fn set_roots(&self, roots: Vec<Root>) -> McpClientResult<()> {
        let Some(current) = &self.roots else {
            return Err(McpClientError::config(
                "roots capability was not declared when connecting",
            ));
        };
        for root in &roots {
            root.validate()?;
        }
        *current.write() = roots;
        self.session
            .send_notification::<RootsListChanged>(&EmptyParams {})
            .await?;
        Ok(())
    }

    /// Shut the session down, giving outstanding requests the configured grace
    pub async fn disconnect(&self) {
        info!(session_id = %self.session.id(), "Disconnecting from MCP server");
        self.session.shutdown().await;
    }

    /// Resolves when the session ends, from either side
    pub async fn closed(&self) -> CloseReason {
        self.session.closed().await
    }

    fn paginate<M>(&self) -> PageStream<<M::Result as PaginatedResult>::Item>
    where
        M: McpRequest<Params = PaginatedParams>,
        M::Result: PaginatedResult,
        <M::Result as PaginatedResult>::Item: Send + 'static,
    {
        let session = self.session.clone();
        stream::unfold(Some(PaginatedParams::first_page()), move |next| {
            let session = session.clone();
            async move {
                let params = next?;
                match session.send_request::<M>(&params).await {
                    Ok(page) => {
                        let next = page.next_cursor().cloned().map(PaginatedParams::after);
                        debug!(method = M::METHOD, more = next.is_some(), "Fetched page");
                        Some((Ok(page.into_items()), next))
                    }
                    Err(e) => Some((Err(McpClientError::from(e)), None)),
                }
            }
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, McpClientError>)))
        .try_flatten()
        .boxed()
    }
}

fn tool_params(name: &str, arguments: Value) -> CallToolParams {
    let params = CallToolParams::new(name);
    if arguments.is_null() {
        params
    } else {
        params.with_arguments(arguments)
    }
}

async fn next_update(progress: &mut Option<ProgressStream>) -> Option<ProgressUpdate> {
    match progress {
        Some(stream) => stream.next_update().await,
        None => None,
    }
}

/// Builder for creating MCP clients
pub struct McpClientBuilder {
    config: ClientConfig,
    roots: Option<Vec<Root>>,
    sampling: Option<Arc<dyn SamplingHandler>>,
    callbacks: ClientCallbacks,
}

impl McpClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            roots: None,
            sampling: None,
            callbacks: ClientCallbacks::default(),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.client_info.name = name.into();
        self.config.client_info.version = version.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.request = timeout;
        self
    }

    /// Declare the roots capability and serve `roots/list` with `roots`
    pub fn with_roots(mut self, roots: Vec<Root>) -> Self {
        self.roots = Some(roots);
        self
    }

    /// Declare the sampling capability and answer `sampling/createMessage`
    pub fn with_sampling<H: SamplingHandler + 'static>(mut self, handler: H) -> Self {
        self.sampling = Some(Arc::new(handler));
        self
    }

    pub fn on_resource_updated<F>(mut self, callback: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.callbacks.resource_updated = Some(Arc::new(callback));
        self
    }

    pub fn on_tools_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(()) + Send + Sync + 'static,
    {
        self.callbacks.tools_changed = Some(Arc::new(callback));
        self
    }

    pub fn on_resources_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(()) + Send + Sync + 'static,
    {
        self.callbacks.resources_changed = Some(Arc::new(callback));
        self
    }

    pub fn on_prompts_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(()) + Send + Sync + 'static,
    {
        self.callbacks.prompts_changed = Some(Arc::new(callback));
        self
    }

    pub fn on_log_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(LoggingMessageParams) + Send + Sync + 'static,
    {
        self.callbacks.log_message = Some(Arc::new(callback));
        self
    }

    fn capabilities(&self) -> ClientCapabilities {
        let mut capabilities = ClientCapabilities::default();
        if self.roots.is_some() {
            capabilities = capabilities.with_roots(true);
        }
        if self.sampling.is_some() {
            capabilities = capabilities.with_sampling();
        }
        capabilities
    }

    /// Start a session on `transport` and run the `initialize` handshake.
    ///
    /// Fails, with the session closed, if the server answers with a protocol
    /// version this client does not support.
    pub async fn connect(self, transport: impl Transport) -> McpClientResult<McpClient> {
        if self.config.client_info.name.is_empty() {
            return Err(McpClientError::config("client name cannot be empty"));
        }
        for root in self.roots.iter().flatten() {
            root.validate()?;
        }

        let mut builder =
            Session::client(self.config.client_info.implementation(), self.capabilities())
                .with_config(self.config.session_config());

        let roots = self.roots.map(|roots| Arc::new(RwLock::new(roots)));
        if let Some(roots) = &roots {
            let roots = roots.clone();
            builder = builder.handle::<ListRoots, _, _>(move |_params: EmptyParams, _ctx| {
                let result = ListRootsResult {
                    roots: roots.read().clone(),
                };
                async move { Ok(result) }
            });
        }
        if let Some(handler) = self.sampling {
            builder = builder.handle::<CreateMessage, _, _>(move |params, _ctx| {
                let handler = handler.clone();
                async move { handler.create_message(params).await }
            });
        }
        let builder = self.callbacks.register(builder);

        let session = builder.start(transport)?;
        let server = session.initialize().await?;
        info!(
            session_id = %session.id(),
            server = %server.server_info.name,
            version = %server.protocol_version,
            "Connected to MCP server"
        );

        Ok(McpClient {
            session,
            server: Arc::new(server),
            roots,
        })
    }
}

impl Default for McpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
