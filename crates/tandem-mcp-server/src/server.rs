//! MCP Server Implementation
//!
//! An [`McpServer`] owns the registered tools, resources, prompts and
//! completion providers and serves any number of sessions over them. Each
//! call to [`McpServer::serve`] starts one session on one transport; the
//! component registries and the subscription registry are shared by all of
//! them, while pagination cursors and the log level belong to each session.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use tandem_mcp_protocol::methods::{
    CallTool, Complete, GetPrompt, ListPrompts, ListResourceTemplates, ListResources, ListTools,
    PromptListChanged, ReadResource, ResourceListChanged, SetLevel, Subscribe, ToolListChanged,
    Unsubscribe,
};
use tandem_mcp_protocol::prompts::ListPromptsResult;
use tandem_mcp_protocol::resources::{ListResourceTemplatesResult, ListResourcesResult};
use tandem_mcp_protocol::tools::ListToolsResult;
use tandem_mcp_protocol::{
    CallToolParams, CallToolResult, CompleteParams, CompleteResult, Completion, Cursor,
    EmptyParams, EmptyResult, GetPromptParams, GetPromptResult, Implementation, McpError,
    McpNotification, McpRequest, McpResult, PaginatedParams, Prompt, ReadResourceResult, Resource,
    ResourceTemplate, ResourceUriParams, ServerCapabilities, SetLevelParams, Tool,
};
use tandem_mcp_session::{
    CloseReason, LifecycleState, LineTransport, PaginationConfig, Paginator, Peer,
    RequestContext, Session, SessionBuilder, SessionConfig, SubscriptionRegistry, Transport,
};

use crate::resource::TemplateEntry;
use crate::{
    McpCompletion, McpPrompt, McpResource, McpResourceTemplate, McpServerBuilder, McpTool, Result,
};

/// Components handed over by the builder
pub(crate) struct Components {
    pub(crate) tools: BTreeMap<String, Arc<dyn McpTool>>,
    pub(crate) resources: BTreeMap<String, Arc<dyn McpResource>>,
    pub(crate) templates: Vec<TemplateEntry>,
    pub(crate) prompts: BTreeMap<String, Arc<dyn McpPrompt>>,
    pub(crate) completions: Vec<Arc<dyn McpCompletion>>,
}

pub(crate) struct ServerState {
    implementation: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    session_config: SessionConfig,
    pagination: PaginationConfig,
    tools: RwLock<BTreeMap<String, Arc<dyn McpTool>>>,
    resources: RwLock<BTreeMap<String, Arc<dyn McpResource>>>,
    templates: RwLock<Vec<TemplateEntry>>,
    prompts: RwLock<BTreeMap<String, Arc<dyn McpPrompt>>>,
    completions: Vec<Arc<dyn McpCompletion>>,
    subscriptions: SubscriptionRegistry,
    sessions: RwLock<HashMap<String, Peer>>,
}

/// Main MCP server. Cheap to clone; clones share every registry.
#[derive(Clone)]
pub struct McpServer {
    state: Arc<ServerState>,
}

impl McpServer {
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    pub(crate) fn new(
        implementation: Implementation,
        capabilities: ServerCapabilities,
        instructions: Option<String>,
        session_config: SessionConfig,
        pagination: PaginationConfig,
        components: Components,
    ) -> Self {
        debug!(
            tools = components.tools.len(),
            resources = components.resources.len(),
            templates = components.templates.len(),
            prompts = components.prompts.len(),
            completions = components.completions.len(),
            "McpServer configured"
        );
        Self {
            state: Arc::new(ServerState {
                implementation,
                capabilities,
                instructions,
                session_config,
                pagination,
                tools: RwLock::new(components.tools),
                resources: RwLock::new(components.resources),
                templates: RwLock::new(components.templates),
                prompts: RwLock::new(components.prompts),
                completions: components.completions,
                subscriptions: SubscriptionRegistry::new(),
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn implementation(&self) -> &Implementation {
        &self.state.implementation
    }

    /// Capabilities declared to every client
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.state.capabilities
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.state.subscriptions
    }

    /// Sessions started by this server that have not closed yet
    pub fn session_count(&self) -> usize {
        self.state.sessions.read().len()
    }

    /// Start a session on `transport` and return without waiting for the
    /// client. Must be called inside a Tokio runtime.
    pub fn serve(&self, transport: impl Transport) -> Result<Session> {
        let paginator = Arc::new(Paginator::new(self.state.pagination.clone()));
        let mut builder = Session::server(
            self.state.implementation.clone(),
            self.state.capabilities.clone(),
        )
        .with_config(self.state.session_config.clone());
        if let Some(instructions) = &self.state.instructions {
            builder = builder.with_instructions(instructions.clone());
        }

        let session = self.register_handlers(builder, paginator).start(transport)?;
        self.track(&session);
        Ok(session)
    }

    /// Serve one session over stdin/stdout until it closes
    pub async fn run_stdio(&self) -> Result<CloseReason> {
        info!(
            name = %self.state.implementation.name,
            version = %self.state.implementation.version,
            "Serving MCP over stdio"
        );
        let session = self.serve(LineTransport::stdio())?;
        let reason = session.closed().await;
        info!(reason = %reason, "Stdio session ended");
        Ok(reason)
    }

    fn register_handlers(
        &self,
        builder: SessionBuilder,
        paginator: Arc<Paginator>,
    ) -> SessionBuilder {
        let capabilities = &self.state.capabilities;
        let mut builder = builder;

        if capabilities.supports_tools() {
            let (state, pages) = (self.state.clone(), paginator.clone());
            builder = builder.handle::<ListTools, _, _>(move |params: PaginatedParams, _ctx| {
                let result = state.list_tools(&pages, params.cursor.as_ref());
                async move { result }
            });
            let state = self.state.clone();
            builder = builder.handle::<CallTool, _, _>(move |params: CallToolParams, ctx| {
                let state = state.clone();
                async move { state.call_tool(params, ctx).await }
            });
        }

        if capabilities.supports_resources() {
            let (state, pages) = (self.state.clone(), paginator.clone());
            builder = builder.handle::<ListResources, _, _>(move |params: PaginatedParams, _ctx| {
                let result = state.list_resources(&pages, params.cursor.as_ref());
                async move { result }
            });
            let (state, pages) = (self.state.clone(), paginator.clone());
            builder = builder.handle::<ListResourceTemplates, _, _>(
                move |params: PaginatedParams, _ctx| {
                    let result = state.list_resource_templates(&pages, params.cursor.as_ref());
                    async move { result }
                },
            );
            let state = self.state.clone();
            builder = builder.handle::<ReadResource, _, _>(move |params: ResourceUriParams, ctx| {
                let state = state.clone();
                async move { state.read_resource(params.uri, ctx).await }
            });
        }

        if capabilities.resources_subscribe() {
            let state = self.state.clone();
            builder = builder.handle::<Subscribe, _, _>(move |params: ResourceUriParams, ctx| {
                state.subscriptions.subscribe(params.uri, ctx.peer);
                async { Ok(EmptyResult {}) }
            });
            let state = self.state.clone();
            builder = builder.handle::<Unsubscribe, _, _>(move |params: ResourceUriParams, ctx| {
                state.subscriptions.unsubscribe(&params.uri, ctx.session_id());
                async { Ok(EmptyResult {}) }
            });
        }

        if capabilities.supports_prompts() {
            let (state, pages) = (self.state.clone(), paginator);
            builder = builder.handle::<ListPrompts, _, _>(move |params: PaginatedParams, _ctx| {
                let result = state.list_prompts(&pages, params.cursor.as_ref());
                async move { result }
            });
            let state = self.state.clone();
            builder = builder.handle::<GetPrompt, _, _>(move |params: GetPromptParams, ctx| {
                let state = state.clone();
                async move { state.get_prompt(params, ctx).await }
            });
        }

        if capabilities.supports_completions() {
            let state = self.state.clone();
            builder = builder.handle::<Complete, _, _>(move |params: CompleteParams, ctx| {
                let state = state.clone();
                async move { state.complete(params, ctx).await }
            });
        }

        if capabilities.supports_logging() {
            builder = builder.handle::<SetLevel, _, _>(|params: SetLevelParams, ctx| async move {
                let session = ctx
                    .peer
                    .session()
                    .map_err(|e| McpError::Internal(e.to_string()))?;
                session.set_log_level(params.level);
                Ok(EmptyResult {})
            });
        }

        builder
    }

    fn track(&self, session: &Session) {
        let session_id = session.id().to_string();
        self.state
            .sessions
            .write()
            .insert(session_id.clone(), session.peer());

        let state: Weak<ServerState> = Arc::downgrade(&self.state);
        let watched = session.clone();
        tokio::spawn(async move {
            let reason = watched.closed().await;
            drop(watched);
            if let Some(state) = state.upgrade() {
                state.sessions.write().remove(&session_id);
                let dropped = state.subscriptions.remove_session(&session_id);
                info!(
                    session_id = %session_id,
                    reason = %reason,
                    subscriptions_dropped = dropped,
                    "Session ended"
                );
            }
        });
    }

    /// Register or replace a tool while serving. Call
    /// [`notify_tools_changed`](Self::notify_tools_changed) afterwards.
    pub fn add_tool<T: McpTool + 'static>(&self, tool: T) {
        let name = tool.definition().name;
        if self.state.tools.write().insert(name.clone(), Arc::new(tool)).is_some() {
            debug!(tool = %name, "Replaced tool");
        }
    }

    pub fn remove_tool(&self, name: &str) -> bool {
        self.state.tools.write().remove(name).is_some()
    }

    pub fn add_resource<R: McpResource + 'static>(&self, resource: R) {
        let uri = resource.definition().uri;
        self.state.resources.write().insert(uri, Arc::new(resource));
    }

    pub fn remove_resource(&self, uri: &str) -> bool {
        self.state.resources.write().remove(uri).is_some()
    }

    pub fn add_resource_template<R>(&self, template: R) -> Result<()>
    where
        R: McpResourceTemplate + 'static,
    {
        let entry = TemplateEntry::new(Arc::new(template))?;
        self.state.templates.write().push(entry);
        Ok(())
    }

    pub fn add_prompt<P: McpPrompt + 'static>(&self, prompt: P) {
        let name = prompt.definition().name;
        self.state.prompts.write().insert(name, Arc::new(prompt));
    }

    pub fn remove_prompt(&self, name: &str) -> bool {
        self.state.prompts.write().remove(name).is_some()
    }

    /// Send `notifications/tools/list_changed` to every operating session.
    /// Returns how many sessions were notified.
    ///
    /// Sessions still handshaking are skipped: a session becomes operating
    /// only after its client's `notifications/initialized` has been processed.
    pub async fn notify_tools_changed(&self) -> usize {
        if !self.state.capabilities.tools_list_changed() {
            debug!("Tools listChanged not declared; notification skipped");
            return 0;
        }
        self.broadcast::<ToolListChanged>(&EmptyParams {}).await
    }

    /// Like [`McpServer::notify_tools_changed`] for `notifications/resources/list_changed`;
    /// sessions still handshaking are skipped.
    pub async fn notify_resources_changed(&self) -> usize {
        if !self.state.capabilities.resources_list_changed() {
            debug!("Resources listChanged not declared; notification skipped");
            return 0;
        }
        self.broadcast::<ResourceListChanged>(&EmptyParams {}).await
    }

    /// Like [`McpServer::notify_tools_changed`] for `notifications/prompts/list_changed`;
    /// sessions still handshaking are skipped.
    pub async fn notify_prompts_changed(&self) -> usize {
        if !self.state.capabilities.prompts_list_changed() {
            debug!("Prompts listChanged not declared; notification skipped");
            return 0;
        }
        self.broadcast::<PromptListChanged>(&EmptyParams {}).await
    }

    /// Fan `notifications/resources/updated` out to the URI's subscribers
    pub async fn notify_resource_updated(&self, uri: &str) -> usize {
        self.state.subscriptions.notify_updated(uri).await
    }

    async fn broadcast<N: McpNotification>(&self, params: &N::Params) -> usize {
        let peers: Vec<Peer> = self.state.sessions.read().values().cloned().collect();
        let mut delivered = 0;
        for peer in peers {
            let operating = peer
                .session()
                .is_ok_and(|session| session.state() == LifecycleState::Operating);
            if !operating {
                continue;
            }
            match peer.send_notification::<N>(params).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    session_id = %peer.session_id(),
                    method = N::METHOD,
                    error = %e,
                    "Broadcast notification failed"
                ),
            }
        }
        delivered
    }
}

impl ServerState {
    fn list_tools(
        &self,
        paginator: &Paginator,
        cursor: Option<&Cursor>,
    ) -> McpResult<ListToolsResult> {
        let tools = self.tools.read().values().map(|tool| tool.definition()).collect();
        let page = paginator.paginate(
            ListTools::METHOD,
            tools,
            |tool: &Tool| tool.name.as_str(),
            cursor,
        )?;
        Ok(page.into_result())
    }

    async fn call_tool(
        &self,
        params: CallToolParams,
        ctx: RequestContext,
    ) -> McpResult<CallToolResult> {
        let tool = self
            .tools
            .read()
            .get(&params.name)
            .cloned()
            .ok_or_else(|| McpError::ToolNotFound(params.name.clone()))?;
        let args = Value::Object(params.arguments.unwrap_or_else(Map::new));

        debug!(tool = %params.name, request_id = %ctx.request_id, "Calling tool");
        match tool.call(args, ctx).await {
            Ok(result) => Ok(result),
            // Explicit JSON-RPC errors are the tool's way of opting out of isError
            Err(McpError::JsonRpc(object)) => Err(McpError::JsonRpc(object)),
            Err(e) => {
                warn!(tool = %params.name, error = %e, "Tool call failed");
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }

    fn list_resources(
        &self,
        paginator: &Paginator,
        cursor: Option<&Cursor>,
    ) -> McpResult<ListResourcesResult> {
        let resources = self
            .resources
            .read()
            .values()
            .map(|resource| resource.definition())
            .collect();
        let page = paginator.paginate(
            ListResources::METHOD,
            resources,
            |resource: &Resource| resource.uri.as_str(),
            cursor,
        )?;
        Ok(page.into_result())
    }

    fn list_resource_templates(
        &self,
        paginator: &Paginator,
        cursor: Option<&Cursor>,
    ) -> McpResult<ListResourceTemplatesResult> {
        let templates = self
            .templates
            .read()
            .iter()
            .map(|entry| entry.template.definition())
            .collect();
        let page = paginator.paginate(
            ListResourceTemplates::METHOD,
            templates,
            |template: &ResourceTemplate| template.uri_template.as_str(),
            cursor,
        )?;
        Ok(page.into_result())
    }

    async fn read_resource(
        &self,
        uri: String,
        ctx: RequestContext,
    ) -> McpResult<ReadResourceResult> {
        let exact = self.resources.read().get(&uri).cloned();
        let contents = match exact {
            Some(resource) => resource.read(ctx).await?,
            None => {
                let matched = self.templates.read().iter().find_map(|entry| {
                    entry
                        .matcher
                        .extract(&uri)
                        .map(|variables| (entry.template.clone(), variables))
                });
                let (template, variables) =
                    matched.ok_or_else(|| McpError::ResourceNotFound(uri.clone()))?;
                template.read(&uri, variables, ctx).await?
            }
        };
        Ok(ReadResourceResult { contents })
    }

    fn list_prompts(
        &self,
        paginator: &Paginator,
        cursor: Option<&Cursor>,
    ) -> McpResult<ListPromptsResult> {
        let prompts = self.prompts.read().values().map(|prompt| prompt.definition()).collect();
        let page = paginator.paginate(
            ListPrompts::METHOD,
            prompts,
            |prompt: &Prompt| prompt.name.as_str(),
            cursor,
        )?;
        Ok(page.into_result())
    }

    async fn get_prompt(
        &self,
        params: GetPromptParams,
        ctx: RequestContext,
    ) -> McpResult<GetPromptResult> {
        let prompt = self
            .prompts
            .read()
            .get(&params.name)
            .cloned()
            .ok_or_else(|| McpError::PromptNotFound(params.name.clone()))?;
        prompt.get_response(params.arguments.unwrap_or_default(), ctx).await
    }

    async fn complete(
        &self,
        params: CompleteParams,
        ctx: RequestContext,
    ) -> McpResult<CompleteResult> {
        let provider = self
            .completions
            .iter()
            .find(|provider| provider.can_handle(&params.reference, &params.argument.name));
        let values = match provider {
            Some(provider) => provider.complete(&params.reference, &params.argument, ctx).await?,
            None => {
                debug!(
                    reference = ?params.reference,
                    argument = %params.argument.name,
                    "No completion provider"
                );
                Vec::new()
            }
        };
        Ok(CompleteResult {
            completion: Completion::from_candidates(values),
        })
    }
}
