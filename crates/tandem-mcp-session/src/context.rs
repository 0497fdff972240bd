//! Explicit handles passed to every handler invocation.

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

use tandem_mcp_json_rpc::{Params, RequestId};
use tandem_mcp_protocol::methods::Progress;
use tandem_mcp_protocol::{
    ClientCapabilities, LoggingLevel, McpNotification, McpRequest, ProgressParams, ProgressToken,
    ServerCapabilities,
};

use crate::cancellation::CancellationHandle;
use crate::error::{SessionError, SessionResult};
use crate::lifecycle::LifecycleState;
use crate::session::{Session, SessionInner};

/// Non-owning handle to the session a message arrived on.
///
/// Handlers use it to talk back to the remote peer, for example to send a
/// `sampling/createMessage` request from inside a tool. Holding a `Peer` does
/// not keep a closed session alive.
#[derive(Clone)]
pub struct Peer {
    session_id: Arc<str>,
    inner: Weak<SessionInner>,
}

impl Peer {
    pub(crate) fn new(session_id: Arc<str>, inner: Weak<SessionInner>) -> Self {
        Self { session_id, inner }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session(&self) -> SessionResult<Session> {
        self.inner
            .upgrade()
            .map(Session::from_inner)
            .ok_or_else(|| SessionError::ConnectionClosed("session dropped".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.session()
            .map(|session| session.state() == LifecycleState::Closed)
            .unwrap_or(true)
    }

    pub fn remote_client_capabilities(&self) -> Option<ClientCapabilities> {
        self.session().ok()?.remote_client_capabilities()
    }

    pub fn remote_server_capabilities(&self) -> Option<ServerCapabilities> {
        self.session().ok()?.remote_server_capabilities()
    }

    pub async fn notify(&self, method: &str, params: Option<Params>) -> SessionResult<()> {
        self.session()?.notify(method, params).await
    }

    pub async fn send_notification<N: McpNotification>(
        &self,
        params: &N::Params,
    ) -> SessionResult<()> {
        self.session()?.send_notification::<N>(params).await
    }

    /// See [`Session::log`]
    pub async fn log(
        &self,
        level: LoggingLevel,
        logger: Option<&str>,
        data: Value,
    ) -> SessionResult<bool> {
        self.session()?.log(level, logger, data).await
    }

    pub async fn request(&self, method: &str, params: Option<Params>) -> SessionResult<Value> {
        self.session()?.request(method, params).await
    }

    pub async fn send_request<M: McpRequest>(
        &self,
        params: &M::Params,
    ) -> SessionResult<M::Result> {
        self.session()?.send_request::<M>(params).await
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("session_id", &self.session_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Everything a request handler knows about the request it is serving
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: String,
    pub cancellation: CancellationHandle,
    /// Set when the requester asked for progress
    pub progress_token: Option<ProgressToken>,
    pub peer: Peer,
}

impl RequestContext {
    pub fn session_id(&self) -> &str {
        self.peer.session_id()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Send a log message to the client if the session's level lets it through
    pub async fn log(&self, level: LoggingLevel, data: impl Into<Value>) -> SessionResult<bool> {
        self.peer.log(level, None, data.into()).await
    }

    /// Emit `notifications/progress`. A no-op when the requester gave no token.
    pub async fn report_progress(&self, progress: f64, total: Option<f64>) -> SessionResult<()> {
        let Some(token) = &self.progress_token else {
            return Ok(());
        };
        let params = ProgressParams::new(token.clone(), progress, total);
        self.peer.send_notification::<Progress>(&params).await
    }

    pub async fn report_progress_with_message(
        &self,
        progress: f64,
        total: Option<f64>,
        message: impl Into<String>,
    ) -> SessionResult<()> {
        let Some(token) = &self.progress_token else {
            return Ok(());
        };
        let params = ProgressParams::new(token.clone(), progress, total).with_message(message);
        self.peer.send_notification::<Progress>(&params).await
    }
}
