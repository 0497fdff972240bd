//! The session: one client/server pairing over one transport.
//!
//! A single inbound task reads frames in order and routes them. Requests are
//! checked against the lifecycle and the negotiated capabilities, then run on
//! their own tasks so a slow handler never blocks unrelated traffic.
//! Notifications go to one ordered worker per session. Responses complete
//! waiters in the correlation table.
//!
//! Teardown happens once, from whichever path gets there first: end of
//! stream, a transport failure, a failed handshake or an explicit shutdown.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use tandem_mcp_json_rpc::{
    JsonRpcErrorObject, JsonRpcMessage, JsonRpcNotification, JsonRpcReply, JsonRpcRequest, Params,
    RequestId, decode_str, encode, to_params,
};
use tandem_mcp_protocol::methods::{
    Cancelled, Initialize, Initialized, LoggingMessage, Ping, Progress,
};
use tandem_mcp_protocol::{
    CancelledParams, ClientCapabilities, EmptyParams, Implementation, InitializeParams,
    InitializeResult, LoggingLevel, LoggingMessageParams, McpNotification, McpRequest, McpResult,
    McpVersion, ProgressParams, ProgressToken, RequestMeta, ServerCapabilities,
};

use crate::cancellation::CancellationHandle;
use crate::capabilities::CapabilityRegistry;
use crate::config::SessionConfig;
use crate::context::{Peer, RequestContext};
use crate::correlation::{CorrelationTable, Resolution, ResolvedRequest, ResponseReceiver};
use crate::dispatcher::{Dispatcher, NotificationHandler, RequestHandler, decode_params};
use crate::error::{SessionError, SessionResult};
use crate::lifecycle::{
    Lifecycle, LifecycleState, SessionRole, accept_version, check_inbound_notification,
    check_inbound_request, check_outbound_notification, check_outbound_request, negotiate_version,
};
use crate::progress::{ProgressStream, ProgressTracker, attach_token};
use crate::transport::Transport;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its end of the transport
    EndOfStream,
    Transport(String),
    /// `Session::shutdown` was called
    Shutdown,
    /// The server answered `initialize` with a version we do not speak
    UnsupportedVersion(String),
    InitializeFailed(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::EndOfStream => f.write_str("end of stream"),
            CloseReason::Transport(e) => write!(f, "transport failure: {}", e),
            CloseReason::Shutdown => f.write_str("shutdown"),
            CloseReason::UnsupportedVersion(v) => write!(f, "unsupported protocol version {}", v),
            CloseReason::InitializeFailed(e) => write!(f, "initialize failed: {}", e),
        }
    }
}

/// Per-request overrides for outbound requests
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Overrides `SessionConfig::request_timeout`
    pub timeout: Option<Duration>,
    /// Ask the peer for `notifications/progress`
    pub progress: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }
}

pub(crate) struct SessionInner {
    id: Arc<str>,
    role: SessionRole,
    config: SessionConfig,
    info: Implementation,
    instructions: Option<String>,
    transport: Arc<dyn Transport>,
    lifecycle: Lifecycle,
    capabilities: CapabilityRegistry,
    correlation: CorrelationTable,
    progress: ProgressTracker,
    dispatcher: Dispatcher,
    /// Inbound requests whose handlers are still running
    inbound: Mutex<HashMap<RequestId, CancellationHandle>>,
    notifications: mpsc::UnboundedSender<JsonRpcNotification>,
    negotiated: OnceLock<McpVersion>,
    remote_info: OnceLock<Implementation>,
    remote_instructions: OnceLock<String>,
    close_reason: OnceLock<CloseReason>,
    /// Minimum level for `notifications/message`, set by `logging/setLevel`
    log_level: Mutex<LoggingLevel>,
}

/// Handle to a running session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

/// Collects handlers and settings, then starts the session on a transport
pub struct SessionBuilder {
    role: SessionRole,
    info: Implementation,
    capabilities: CapabilityRegistry,
    config: SessionConfig,
    instructions: Option<String>,
    dispatcher: Dispatcher,
    errors: Vec<SessionError>,
}

impl SessionBuilder {
    fn new(role: SessionRole, info: Implementation, capabilities: CapabilityRegistry) -> Self {
        Self {
            role,
            info,
            capabilities,
            config: SessionConfig::default(),
            instructions: None,
            dispatcher: Dispatcher::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Server only: returned to the client in the `initialize` result
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Serve a typed request method
    pub fn handle<M, F, Fut>(mut self, f: F) -> Self
    where
        M: McpRequest,
        F: Fn(M::Params, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<M::Result>> + Send + 'static,
    {
        if let Err(e) = self.dispatcher.register_typed::<M, F, Fut>(f) {
            self.errors.push(e);
        }
        self
    }

    /// Serve a request method with a raw handler
    pub fn handle_raw(
        mut self,
        method: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> Self {
        if let Err(e) = self.dispatcher.register(method, handler) {
            self.errors.push(e);
        }
        self
    }

    /// Consume a typed notification
    pub fn on<N, F, Fut>(mut self, f: F) -> Self
    where
        N: McpNotification,
        F: Fn(N::Params, Peer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Err(e) = self.dispatcher.register_typed_notification::<N, F, Fut>(f) {
            self.errors.push(e);
        }
        self
    }

    pub fn on_notification(
        mut self,
        method: impl Into<String>,
        handler: Arc<dyn NotificationHandler>,
    ) -> Self {
        if let Err(e) = self.dispatcher.register_notification(method, handler) {
            self.errors.push(e);
        }
        self
    }

    /// Start the inbound loop. Must be called inside a Tokio runtime.
    ///
    /// Fails with the first registration error, if any, or an invalid config.
    pub fn start(self, transport: impl Transport) -> SessionResult<Session> {
        if let Some(e) = self.errors.into_iter().next() {
            return Err(e);
        }
        self.config.validate()?;

        let (notifications, notification_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            id: Arc::from(Uuid::now_v7().to_string()),
            role: self.role,
            correlation: CorrelationTable::new(self.config.max_cancelled_tombstones),
            config: self.config,
            info: self.info,
            instructions: self.instructions,
            transport: Arc::new(transport),
            lifecycle: Lifecycle::new(),
            capabilities: self.capabilities,
            progress: ProgressTracker::new(),
            dispatcher: self.dispatcher,
            inbound: Mutex::new(HashMap::new()),
            notifications,
            negotiated: OnceLock::new(),
            remote_info: OnceLock::new(),
            remote_instructions: OnceLock::new(),
            close_reason: OnceLock::new(),
            log_level: Mutex::new(LoggingLevel::default()),
        });

        info!(
            session_id = %inner.id,
            role = %inner.role,
            handlers = ?inner.dispatcher.methods(),
            "Session started"
        );

        // Background tasks log under the span of whoever started the session
        tokio::spawn(run_notifications(Arc::downgrade(&inner), notification_rx).in_current_span());
        tokio::spawn(run_inbound(inner.clone()).in_current_span());
        Ok(Session { inner })
    }
}

impl Session {
    /// Start building the client end of a session
    pub fn client(info: Implementation, capabilities: ClientCapabilities) -> SessionBuilder {
        SessionBuilder::new(
            SessionRole::Client,
            info,
            CapabilityRegistry::for_client(capabilities),
        )
    }

    /// Start building the server end of a session
    pub fn server(info: Implementation, capabilities: ServerCapabilities) -> SessionBuilder {
        SessionBuilder::new(
            SessionRole::Server,
            info,
            CapabilityRegistry::for_server(capabilities),
        )
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn role(&self) -> SessionRole {
        self.inner.role
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn peer(&self) -> Peer {
        self.inner.peer()
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.inner.capabilities
    }

    /// Version agreed during `initialize`
    pub fn protocol_version(&self) -> Option<McpVersion> {
        self.inner.negotiated.get().copied()
    }

    pub fn remote_info(&self) -> Option<&Implementation> {
        self.inner.remote_info.get()
    }

    /// Instructions the server sent with its `initialize` result
    pub fn remote_instructions(&self) -> Option<&str> {
        self.inner.remote_instructions.get().map(String::as_str)
    }

    pub fn remote_client_capabilities(&self) -> Option<ClientCapabilities> {
        match self.inner.role {
            SessionRole::Server => self.inner.capabilities.client().cloned(),
            SessionRole::Client => None,
        }
    }

    pub fn remote_server_capabilities(&self) -> Option<ServerCapabilities> {
        match self.inner.role {
            SessionRole::Client => self.inner.capabilities.server().cloned(),
            SessionRole::Server => None,
        }
    }

    /// Threshold for MCP log messages sent on this session
    pub fn log_level(&self) -> LoggingLevel {
        *self.inner.log_level.lock()
    }

    pub fn set_log_level(&self, level: LoggingLevel) {
        let previous = std::mem::replace(&mut *self.inner.log_level.lock(), level);
        if previous != level {
            debug!(
                session_id = %self.inner.id,
                from = %previous,
                to = %level,
                "Log level changed"
            );
        }
    }

    /// Server only: send `notifications/message`.
    ///
    /// Returns `Ok(false)` without sending when the message is below the
    /// session's level or the server never declared the `logging` capability.
    pub async fn log(
        &self,
        level: LoggingLevel,
        logger: Option<&str>,
        data: Value,
    ) -> SessionResult<bool> {
        let declared = self
            .inner
            .capabilities
            .server()
            .is_some_and(ServerCapabilities::supports_logging);
        if self.inner.role != SessionRole::Server || !declared || !level.passes(self.log_level()) {
            return Ok(false);
        }
        let mut params = LoggingMessageParams::new(level, data);
        if let Some(logger) = logger {
            params = params.with_logger(logger);
        }
        self.send_notification::<LoggingMessage>(&params).await?;
        Ok(true)
    }

    /// Client only: run the `initialize` handshake.
    ///
    /// Proposes the newest supported version. If the server counter-proposes
    /// a version this side does not support, the session is closed.
    pub async fn initialize(&self) -> SessionResult<InitializeResult> {
        let inner = &self.inner;
        if inner.role != SessionRole::Client {
            return Err(SessionError::invalid_state(
                inner.lifecycle.state(),
                "initialize from the server side",
            ));
        }
        inner
            .lifecycle
            .transition(&[LifecycleState::Uninitialized], LifecycleState::Initializing)
            .map_err(|state| SessionError::invalid_state(state, "initialize"))?;

        let proposed = inner.config.preferred_version();
        info!(session_id = %inner.id, version = %proposed, "Initializing session");

        let params = InitializeParams::new(
            proposed,
            inner.capabilities.client().cloned().unwrap_or_default(),
            inner.info.clone(),
        );
        let options = RequestOptions::new().with_timeout(inner.config.initialize_timeout);
        let issued = inner
            .issue_request(Initialize::METHOD, to_params(&params)?, options)
            .await;
        let outcome = match issued {
            Ok(handle) => handle.response_as::<InitializeResult>().await,
            Err(e) => Err(e),
        };
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                error!(session_id = %inner.id, error = %e, "Initialize failed");
                inner.teardown(CloseReason::InitializeFailed(e.to_string())).await;
                return Err(e);
            }
        };

        let supported = &inner.config.supported_versions;
        let version = match accept_version(&result.protocol_version, supported) {
            Ok(version) => version,
            Err(e) => {
                error!(
                    session_id = %inner.id,
                    offered = %result.protocol_version,
                    "Server offered an unsupported protocol version"
                );
                inner
                    .teardown(CloseReason::UnsupportedVersion(result.protocol_version.clone()))
                    .await;
                return Err(e);
            }
        };

        let _ = inner.negotiated.set(version);
        inner.capabilities.freeze_remote_server(result.capabilities.clone());
        let _ = inner.remote_info.set(result.server_info.clone());
        if let Some(instructions) = &result.instructions {
            let _ = inner.remote_instructions.set(instructions.clone());
        }

        // Operating before the ack goes out, so requests the server sends in
        // response to it are accepted
        inner
            .lifecycle
            .transition(&[LifecycleState::Initializing], LifecycleState::Operating)
            .map_err(|state| SessionError::invalid_state(state, "complete initialize"))?;
        inner
            .send_message(&JsonRpcNotification::new_no_params(Initialized::METHOD).into())
            .await?;

        info!(
            session_id = %inner.id,
            version = %version,
            server = %result.server_info.name,
            "Session operating"
        );
        Ok(result)
    }

    /// Send a request and wait for its result
    pub async fn request(&self, method: &str, params: Option<Params>) -> SessionResult<Value> {
        self.request_with(method, params, RequestOptions::default())
            .await?
            .response()
            .await
    }

    /// Send a request and return a handle to its pending result
    pub async fn request_with(
        &self,
        method: &str,
        params: Option<Params>,
        options: RequestOptions,
    ) -> SessionResult<RequestHandle> {
        check_outbound_request(self.inner.lifecycle.state(), method)?;
        self.inner.check_outbound_capability(method)?;
        self.inner.issue_request(method, params, options).await
    }

    pub async fn send_request<M: McpRequest>(
        &self,
        params: &M::Params,
    ) -> SessionResult<M::Result> {
        self.send_request_with::<M>(params, RequestOptions::default())
            .await?
            .response_as::<M::Result>()
            .await
    }

    pub async fn send_request_with<M: McpRequest>(
        &self,
        params: &M::Params,
        options: RequestOptions,
    ) -> SessionResult<RequestHandle> {
        self.request_with(M::METHOD, to_params(params)?, options).await
    }

    pub async fn notify(&self, method: &str, params: Option<Params>) -> SessionResult<()> {
        check_outbound_notification(self.inner.lifecycle.state(), method)?;
        self.inner.check_outbound_capability(method)?;
        self.inner
            .send_message(&JsonRpcNotification::new(method, params).into())
            .await
    }

    pub async fn send_notification<N: McpNotification>(
        &self,
        params: &N::Params,
    ) -> SessionResult<()> {
        self.notify(N::METHOD, to_params(params)?).await
    }

    /// Abandon an outstanding request and tell the peer.
    /// Returns false if the request had already resolved.
    pub async fn cancel_request(
        &self,
        id: &RequestId,
        reason: Option<String>,
    ) -> SessionResult<bool> {
        self.inner.cancel_outbound(id, reason).await
    }

    pub async fn ping(&self) -> SessionResult<()> {
        self.send_request::<Ping>(&EmptyParams {}).await.map(|_| ())
    }

    pub fn outstanding_requests(&self) -> usize {
        self.inner.correlation.outstanding()
    }

    /// Stop accepting work, give outstanding requests `shutdown_grace` to
    /// finish, then close the transport and fail whatever is left.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        match inner.lifecycle.transition(
            &[
                LifecycleState::Uninitialized,
                LifecycleState::Initializing,
                LifecycleState::Operating,
            ],
            LifecycleState::ShuttingDown,
        ) {
            Ok(_) => info!(session_id = %inner.id, "Session shutting down"),
            Err(LifecycleState::Closed) => return,
            Err(_) => {}
        }

        let grace = inner.config.shutdown_grace;
        if tokio::time::timeout(grace, inner.correlation.drained()).await.is_err() {
            warn!(
                session_id = %inner.id,
                outstanding = inner.correlation.outstanding(),
                "Shutdown grace period elapsed with requests outstanding"
            );
        }
        inner.teardown(CloseReason::Shutdown).await;
    }

    /// Resolves once the session is closed, with the reason
    pub async fn closed(&self) -> CloseReason {
        let mut state = self.inner.lifecycle.subscribe();
        let _ = state.wait_for(|s| *s == LifecycleState::Closed).await;
        self.close_reason().unwrap_or(CloseReason::Shutdown)
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.close_reason.get().cloned()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("role", &self.inner.role)
            .field("state", &self.inner.lifecycle.state())
            .finish()
    }
}

/// An outbound request awaiting its response
pub struct RequestHandle {
    inner: Arc<SessionInner>,
    id: RequestId,
    method: String,
    timeout: Duration,
    progress_token: Option<ProgressToken>,
    progress: Option<ProgressStream>,
    rx: ResponseReceiver,
}

impl RequestHandle {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn progress_token(&self) -> Option<&ProgressToken> {
        self.progress_token.as_ref()
    }

    /// Progress updates, when the request was sent `with_progress`
    pub fn take_progress(&mut self) -> Option<ProgressStream> {
        self.progress.take()
    }

    /// Wait for the result.
    ///
    /// On timeout the request is abandoned, the peer receives
    /// `notifications/cancelled` and a late response is discarded.
    pub async fn response(self) -> SessionResult<Value> {
        let RequestHandle {
            inner,
            id,
            method,
            timeout,
            mut rx,
            ..
        } = self;

        if let Ok(received) = tokio::time::timeout(timeout, &mut rx).await {
            return received.unwrap_or_else(|_| Err(channel_dropped()));
        }

        let error = SessionError::Timeout {
            method: method.clone(),
            after: timeout,
        };
        if let Some(resolved) = inner.correlation.abandon(&id, error) {
            warn!(
                session_id = %inner.id,
                request_id = %id,
                method = %method,
                "Request timed out"
            );
            inner.release_progress(&resolved);
            // initialize is never cancelled; a failed handshake closes the session instead
            if method != Initialize::METHOD {
                let _ = inner.send_cancelled(&id, Some("timeout".to_string())).await;
            }
        }
        rx.try_recv().unwrap_or_else(|_| Err(channel_dropped()))
    }

    pub async fn response_as<T: DeserializeOwned>(self) -> SessionResult<T> {
        let value = self.response().await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Cancel the request. The waiter resolves with `Cancelled`.
    pub async fn cancel(self, reason: Option<String>) -> SessionResult<bool> {
        self.inner.cancel_outbound(&self.id, reason).await
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn channel_dropped() -> SessionError {
    SessionError::ConnectionClosed("response channel dropped".to_string())
}

impl SessionInner {
    fn peer(self: &Arc<Self>) -> Peer {
        Peer::new(self.id.clone(), Arc::downgrade(self))
    }

    fn check_outbound_capability(&self, method: &str) -> SessionResult<()> {
        self.capabilities.check(method).map_err(|requirement| {
            error!(
                session_id = %self.id,
                method = %method,
                requirement = %requirement,
                "Refusing to send a method the negotiated capabilities do not cover"
            );
            SessionError::CapabilityNotSupported {
                method: method.to_string(),
                requirement: requirement.to_string(),
            }
        })
    }

    /// Register and send a request without lifecycle or capability checks
    async fn issue_request(
        self: &Arc<Self>,
        method: &str,
        params: Option<Params>,
        options: RequestOptions,
    ) -> SessionResult<RequestHandle> {
        let (progress_token, progress) = if options.progress {
            let (token, stream) = self.progress.register();
            (Some(token), Some(stream))
        } else {
            (None, None)
        };
        let params = match &progress_token {
            Some(token) => Some(attach_token(params, token)),
            None => params,
        };

        let (id, rx) = match self.correlation.issue(method, progress_token.clone()) {
            Ok(issued) => issued,
            Err(e) => {
                if let Some(token) = &progress_token {
                    self.progress.release(token);
                }
                return Err(e);
            }
        };
        if let Some(token) = &progress_token {
            self.progress.bind(token, id.clone());
        }

        let request = JsonRpcRequest::new(id.clone(), method, params);
        if let Err(e) = self.send_message(&request.into()).await {
            if let Some(resolved) = self
                .correlation
                .abandon(&id, SessionError::ConnectionClosed(e.to_string()))
            {
                self.release_progress(&resolved);
            }
            return Err(e);
        }

        Ok(RequestHandle {
            inner: self.clone(),
            id,
            method: method.to_string(),
            timeout: options.timeout.unwrap_or(self.config.request_timeout),
            progress_token,
            progress,
            rx,
        })
    }

    async fn cancel_outbound(&self, id: &RequestId, reason: Option<String>) -> SessionResult<bool> {
        let Some(resolved) = self.correlation.cancel(id, reason.clone()) else {
            return Ok(false);
        };
        info!(
            session_id = %self.id,
            request_id = %id,
            method = %resolved.method,
            "Cancelled outbound request"
        );
        self.release_progress(&resolved);
        self.send_cancelled(id, reason).await?;
        Ok(true)
    }

    async fn send_cancelled(&self, id: &RequestId, reason: Option<String>) -> SessionResult<()> {
        let params = to_params(&CancelledParams::new(id.clone(), reason))?;
        check_outbound_notification(self.lifecycle.state(), Cancelled::METHOD)?;
        self.send_message(&JsonRpcNotification::new(Cancelled::METHOD, params).into())
            .await
    }

    fn release_progress(&self, resolved: &ResolvedRequest) {
        if let Some(token) = &resolved.progress_token {
            self.progress.release(token);
        }
    }

    async fn send_message(&self, message: &JsonRpcMessage) -> SessionResult<()> {
        let frame = encode(message)?;
        debug!(
            session_id = %self.id,
            kind = message.kind(),
            method = ?message.method(),
            id = ?message.id(),
            "TX"
        );
        if let Err(e) = self.transport.send(frame).await {
            if self.close_reason.get().is_none() {
                error!(session_id = %self.id, error = %e, "Transport write failed");
                self.teardown(CloseReason::Transport(e.to_string())).await;
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn reply(&self, id: RequestId, outcome: Result<Value, JsonRpcErrorObject>) {
        let reply = match outcome {
            Ok(result) => JsonRpcReply::success(id, result),
            Err(error) => JsonRpcReply::error(id, error),
        };
        if let Err(e) = self.send_message(&reply.into()).await {
            debug!(session_id = %self.id, error = %e, "Could not deliver response");
        }
    }

    async fn handle_frame(self: &Arc<Self>, frame: &str) {
        match decode_str(frame) {
            Ok(message) => {
                debug!(
                    session_id = %self.id,
                    kind = message.kind(),
                    method = ?message.method(),
                    id = ?message.id(),
                    "RX"
                );
                match message {
                    JsonRpcMessage::Request(request) => self.handle_request(request).await,
                    JsonRpcMessage::Notification(notification) => {
                        self.handle_notification(notification)
                    }
                    JsonRpcMessage::Response(response) => {
                        self.handle_reply(&response.id, Ok(response.result))
                    }
                    JsonRpcMessage::Error(err) => match &err.id {
                        Some(id) => self.handle_reply(id, Err(err.error.clone())),
                        None => warn!(
                            session_id = %self.id,
                            code = err.error.code,
                            message = %err.error.message,
                            "Peer reported an error it could not attribute to a request"
                        ),
                    },
                }
            }
            Err(e) => match e.to_error_response() {
                Some(response) => {
                    warn!(session_id = %self.id, error = %e, "Rejecting malformed request");
                    if let Err(send_error) = self.send_message(&response.into()).await {
                        debug!(
                            session_id = %self.id,
                            error = %send_error,
                            "Could not report decode error"
                        );
                    }
                }
                None => warn!(session_id = %self.id, error = %e, "Dropping malformed frame"),
            },
        }
    }

    fn handle_reply(&self, id: &RequestId, outcome: Result<Value, JsonRpcErrorObject>) {
        if let Resolution::Delivered(resolved) = self.correlation.resolve(id, outcome) {
            self.release_progress(&resolved);
        }
    }

    async fn handle_request(self: &Arc<Self>, request: JsonRpcRequest) {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        if let Err(reason) = check_inbound_request(self.lifecycle.state(), self.role, &method) {
            warn!(
                session_id = %self.id,
                request_id = %id,
                method = %method,
                state = %self.lifecycle.state(),
                "Rejecting request: {}",
                reason
            );
            let message = format!("{}: {}", reason, method);
            let error = JsonRpcErrorObject::invalid_request(Some(message));
            self.reply(id, Err(error)).await;
            return;
        }

        if method == Ping::METHOD {
            self.reply(id, Ok(json!({}))).await;
            return;
        }
        if method == Initialize::METHOD {
            let outcome = self.accept_initialize(params);
            self.reply(id, outcome).await;
            return;
        }

        if let Err(requirement) = self.capabilities.check(&method) {
            warn!(
                session_id = %self.id,
                request_id = %id,
                method = %method,
                requirement = %requirement,
                "Peer invoked a method outside the negotiated capabilities"
            );
            let message = format!("'{}' requires {}", method, requirement);
            self.reply(id, Err(JsonRpcErrorObject::invalid_request(Some(message))))
                .await;
            return;
        }

        let Some(handler) = self.dispatcher.request_handler(&method) else {
            debug!(session_id = %self.id, method = %method, "No handler registered");
            self.reply(id, Err(JsonRpcErrorObject::method_not_found(&method)))
                .await;
            return;
        };

        let cancellation = CancellationHandle::new();
        let duplicate = {
            let mut inbound = self.inbound.lock();
            if inbound.contains_key(&id) {
                true
            } else {
                inbound.insert(id.clone(), cancellation.clone());
                false
            }
        };
        if duplicate {
            warn!(session_id = %self.id, request_id = %id, "Request id already in flight");
            let error = JsonRpcErrorObject::invalid_request(Some(format!(
                "request id {} is already in flight",
                id
            )));
            self.reply(id, Err(error)).await;
            return;
        }

        let ctx = RequestContext {
            request_id: id.clone(),
            method: method.clone(),
            cancellation: cancellation.clone(),
            progress_token: RequestMeta::progress_token_of(params.as_ref()),
            peer: self.peer(),
        };

        let inner = self.clone();
        let task = async move {
            let outcome = handler.handle(params, ctx).await;
            inner.inbound.lock().remove(&id);
            if cancellation.is_cancelled() {
                debug!(
                    session_id = %inner.id,
                    request_id = %id,
                    method = %method,
                    "Suppressing response to cancelled request"
                );
                return;
            }
            if let Err(e) = &outcome {
                debug!(
                    session_id = %inner.id,
                    request_id = %id,
                    method = %method,
                    error = %e,
                    "Handler failed"
                );
            }
            inner.reply(id, outcome.map_err(|e| e.to_error_object())).await;
        };
        tokio::spawn(task.in_current_span());
    }

    fn accept_initialize(&self, params: Option<Params>) -> Result<Value, JsonRpcErrorObject> {
        let params: InitializeParams = decode_params(Initialize::METHOD, params)
            .map_err(|e| e.to_error_object())?;

        if let Err(state) = self
            .lifecycle
            .transition(&[LifecycleState::Uninitialized], LifecycleState::Initializing)
        {
            return Err(JsonRpcErrorObject::invalid_request(Some(format!(
                "cannot initialize while {}",
                state
            ))));
        }

        let version = negotiate_version(&params.protocol_version, &self.config.supported_versions);
        if version.as_str() != params.protocol_version {
            info!(
                session_id = %self.id,
                requested = %params.protocol_version,
                offered = %version,
                "Counter-proposing protocol version"
            );
        }
        let _ = self.negotiated.set(version);
        self.capabilities.freeze_remote_client(params.capabilities);
        info!(
            session_id = %self.id,
            client = %params.client_info.name,
            version = %version,
            "Accepted initialize"
        );
        let _ = self.remote_info.set(params.client_info);

        let mut result = InitializeResult::new(
            version,
            self.capabilities.server().cloned().unwrap_or_default(),
            self.info.clone(),
        );
        if let Some(instructions) = &self.instructions {
            result = result.with_instructions(instructions.clone());
        }
        serde_json::to_value(result)
            .map_err(|e| JsonRpcErrorObject::internal_error(Some(e.to_string())))
    }

    fn handle_notification(&self, notification: JsonRpcNotification) {
        let method = notification.method.as_str();
        let state = self.lifecycle.state();
        if !check_inbound_notification(state, self.role, method) {
            warn!(
                session_id = %self.id,
                method = %method,
                state = %state,
                "Dropping notification not legal in this state"
            );
            return;
        }
        if let Err(requirement) = self.capabilities.check(method) {
            warn!(
                session_id = %self.id,
                method = %method,
                requirement = %requirement,
                "Dropping notification outside the negotiated capabilities"
            );
            return;
        }

        if method == Initialized::METHOD {
            if self
                .lifecycle
                .transition(&[LifecycleState::Initializing], LifecycleState::Operating)
                .is_ok()
            {
                info!(session_id = %self.id, "Session operating");
            }
        } else if method == Cancelled::METHOD {
            match decode_params::<CancelledParams>(method, notification.params.clone()) {
                Ok(params) => self.cancel_inbound(params),
                Err(e) => warn!(session_id = %self.id, error = %e, "Malformed cancellation"),
            }
        } else if method == Progress::METHOD {
            match decode_params::<ProgressParams>(method, notification.params.clone()) {
                Ok(params) => {
                    self.progress.deliver(params);
                }
                Err(e) => warn!(session_id = %self.id, error = %e, "Malformed progress"),
            }
        }

        if self.dispatcher.has_notification_handler(method) {
            // The worker only stops once this session is gone
            let _ = self.notifications.send(notification);
        }
    }

    fn cancel_inbound(&self, params: CancelledParams) {
        match self.inbound.lock().get(&params.request_id) {
            Some(handle) => {
                info!(
                    session_id = %self.id,
                    request_id = %params.request_id,
                    reason = ?params.reason,
                    "Peer cancelled request"
                );
                handle.cancel(params.reason);
            }
            None => debug!(
                session_id = %self.id,
                request_id = %params.request_id,
                "Cancellation for a request that is not in flight"
            ),
        }
    }

    async fn teardown(&self, reason: CloseReason) {
        if self.close_reason.set(reason.clone()).is_err() {
            return;
        }
        info!(session_id = %self.id, reason = %reason, "Closing session");

        let failed = self.correlation.fail_all(&reason.to_string());
        if failed > 0 {
            warn!(session_id = %self.id, failed, "Failed outstanding requests on close");
        }
        for (_, handle) in self.inbound.lock().drain() {
            handle.cancel(Some("session closed".to_string()));
        }
        self.progress.clear();
        self.lifecycle.close();

        if let Err(e) = self.transport.close().await {
            debug!(session_id = %self.id, error = %e, "Transport close failed");
        }
    }
}

async fn wait_closed(state: &mut tokio::sync::watch::Receiver<LifecycleState>) {
    let _ = state.wait_for(|s| *s == LifecycleState::Closed).await;
}

async fn run_inbound(inner: Arc<SessionInner>) {
    let mut state = inner.lifecycle.subscribe();
    let reason = loop {
        let frame = tokio::select! {
            frame = inner.transport.receive() => frame,
            _ = wait_closed(&mut state) => break None,
        };
        match frame {
            Ok(Some(frame)) => inner.handle_frame(&frame).await,
            Ok(None) => break Some(CloseReason::EndOfStream),
            Err(e) if e.is_frame_local() => {
                warn!(session_id = %inner.id, error = %e, "Dropping unreadable frame");
            }
            Err(e) => {
                error!(session_id = %inner.id, error = %e, "Transport read failed");
                break Some(CloseReason::Transport(e.to_string()));
            }
        }
    };

    if let Some(reason) = reason {
        let _ = inner.lifecycle.transition(
            &[
                LifecycleState::Uninitialized,
                LifecycleState::Initializing,
                LifecycleState::Operating,
            ],
            LifecycleState::ShuttingDown,
        );
        inner.teardown(reason).await;
    }
    debug!(session_id = %inner.id, "Inbound loop finished");
}

/// Runs notification handlers one at a time, in arrival order
async fn run_notifications(
    session: Weak<SessionInner>,
    mut rx: mpsc::UnboundedReceiver<JsonRpcNotification>,
) {
    while let Some(notification) = rx.recv().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        let handler = inner.dispatcher.notification_handler(&notification.method);
        let peer = inner.peer();
        drop(inner);
        if let Some(handler) = handler {
            handler.handle(notification.params, peer).await;
        }
    }
}
