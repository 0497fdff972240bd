//! Method routing
//!
//! One handler per method name. Registering a second handler for a method is
//! an error, as is registering `initialize` or `ping`, which the engine
//! answers itself. The table is built before the session starts and is
//! read-only afterwards, so lookups from concurrent tasks need no lock.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use tandem_mcp_json_rpc::Params;
use tandem_mcp_protocol::methods::{Initialize, Ping};
use tandem_mcp_protocol::{McpError, McpNotification, McpRequest, McpResult};

use crate::context::{Peer, RequestContext};
use crate::error::{SessionError, SessionResult};

/// Serves one inbound request method
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, params: Option<Params>, ctx: RequestContext) -> McpResult<Value>;
}

/// Consumes one inbound notification method
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, params: Option<Params>, peer: Peer);
}

/// Decode params for a method, treating absent params as `{}`
pub fn decode_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: Option<Params>,
) -> McpResult<T> {
    serde_json::from_value(Value::Object(params.unwrap_or_default()))
        .map_err(|e| McpError::InvalidParameters(format!("{}: {}", method, e)))
}

/// Request handler backed by a closure over raw params
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Option<Params>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = McpResult<Value>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Option<Params>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = McpResult<Value>> + Send + 'static,
{
    async fn handle(&self, params: Option<Params>, ctx: RequestContext) -> McpResult<Value> {
        (self.f)(params, ctx).await
    }
}

/// Request handler for a typed method contract
pub struct TypedHandler<M, F> {
    f: F,
    _method: PhantomData<fn() -> M>,
}

impl<M, F> TypedHandler<M, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _method: PhantomData,
        }
    }
}

#[async_trait]
impl<M, F, Fut> RequestHandler for TypedHandler<M, F>
where
    M: McpRequest,
    F: Fn(M::Params, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = McpResult<M::Result>> + Send + 'static,
{
    async fn handle(&self, params: Option<Params>, ctx: RequestContext) -> McpResult<Value> {
        let params: M::Params = decode_params(M::METHOD, params)?;
        let result = (self.f)(params, ctx).await?;
        Ok(serde_json::to_value(result)?)
    }
}

/// Notification handler backed by a closure over raw params
pub struct NotificationFn<F> {
    f: F,
}

pub fn notification_fn<F, Fut>(f: F) -> NotificationFn<F>
where
    F: Fn(Option<Params>, Peer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    NotificationFn { f }
}

#[async_trait]
impl<F, Fut> NotificationHandler for NotificationFn<F>
where
    F: Fn(Option<Params>, Peer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, params: Option<Params>, peer: Peer) {
        (self.f)(params, peer).await
    }
}

/// Notification handler for a typed notification contract.
/// Params that fail to decode are logged and dropped.
pub struct TypedNotificationHandler<N, F> {
    f: F,
    _notification: PhantomData<fn() -> N>,
}

impl<N, F> TypedNotificationHandler<N, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _notification: PhantomData,
        }
    }
}

#[async_trait]
impl<N, F, Fut> NotificationHandler for TypedNotificationHandler<N, F>
where
    N: McpNotification,
    F: Fn(N::Params, Peer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, params: Option<Params>, peer: Peer) {
        match decode_params::<N::Params>(N::METHOD, params) {
            Ok(params) => (self.f)(params, peer).await,
            Err(e) => warn!(method = N::METHOD, error = %e, "Dropping malformed notification"),
        }
    }
}

#[derive(Default)]
pub struct Dispatcher {
    requests: HashMap<String, Arc<dyn RequestHandler>>,
    notifications: HashMap<String, Arc<dyn NotificationHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        method: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) -> SessionResult<()> {
        let method = method.into();
        if method == Initialize::METHOD || method == Ping::METHOD {
            return Err(SessionError::ReservedMethod(method));
        }
        if self.requests.contains_key(&method) {
            return Err(SessionError::DuplicateHandler(method));
        }
        debug!(method = %method, "Registered request handler");
        self.requests.insert(method, handler);
        Ok(())
    }

    pub fn register_typed<M, F, Fut>(&mut self, f: F) -> SessionResult<()>
    where
        M: McpRequest,
        F: Fn(M::Params, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<M::Result>> + Send + 'static,
    {
        self.register(M::METHOD, Arc::new(TypedHandler::<M, F>::new(f)))
    }

    pub fn register_notification(
        &mut self,
        method: impl Into<String>,
        handler: Arc<dyn NotificationHandler>,
    ) -> SessionResult<()> {
        let method = method.into();
        if self.notifications.contains_key(&method) {
            return Err(SessionError::DuplicateHandler(method));
        }
        debug!(method = %method, "Registered notification handler");
        self.notifications.insert(method, handler);
        Ok(())
    }

    pub fn register_typed_notification<N, F, Fut>(&mut self, f: F) -> SessionResult<()>
    where
        N: McpNotification,
        F: Fn(N::Params, Peer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register_notification(N::METHOD, Arc::new(TypedNotificationHandler::<N, F>::new(f)))
    }

    pub fn request_handler(&self, method: &str) -> Option<Arc<dyn RequestHandler>> {
        self.requests.get(method).cloned()
    }

    pub fn notification_handler(&self, method: &str) -> Option<Arc<dyn NotificationHandler>> {
        self.notifications.get(method).cloned()
    }

    pub fn has_notification_handler(&self, method: &str) -> bool {
        self.notifications.contains_key(method)
    }

    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.requests.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }
}
