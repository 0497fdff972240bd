//! Handlers for traffic the server initiates
//!
//! Sampling requests go to a [`SamplingHandler`]. Notifications go to plain
//! callbacks registered on the builder. Callbacks run on the session's
//! notification task, so they should return quickly.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use tandem_mcp_protocol::methods::{
    LoggingMessage, PromptListChanged, ResourceListChanged, ResourceUpdated, ToolListChanged,
};
use tandem_mcp_protocol::{
    CreateMessageParams, CreateMessageResult, LoggingMessageParams, McpNotification, McpResult,
};
use tandem_mcp_session::SessionBuilder;

/// Answers `sampling/createMessage` on behalf of the host's LLM
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(&self, params: CreateMessageParams) -> McpResult<CreateMessageResult>;
}

pub(crate) type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Callbacks for server notifications
#[derive(Default, Clone)]
pub(crate) struct ClientCallbacks {
    pub resource_updated: Option<Callback<String>>,
    pub tools_changed: Option<Callback<()>>,
    pub resources_changed: Option<Callback<()>>,
    pub prompts_changed: Option<Callback<()>>,
    pub log_message: Option<Callback<LoggingMessageParams>>,
}

impl fmt::Debug for ClientCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |present: bool| if present { "function" } else { "none" };
        f.debug_struct("ClientCallbacks")
            .field("resource_updated", &set(self.resource_updated.is_some()))
            .field("tools_changed", &set(self.tools_changed.is_some()))
            .field("resources_changed", &set(self.resources_changed.is_some()))
            .field("prompts_changed", &set(self.prompts_changed.is_some()))
            .field("log_message", &set(self.log_message.is_some()))
            .finish()
    }
}

impl ClientCallbacks {
    pub(crate) fn register(self, builder: SessionBuilder) -> SessionBuilder {
        let builder = on::<ResourceUpdated, _>(builder, self.resource_updated, |p| p.uri);
        let builder = on::<ToolListChanged, _>(builder, self.tools_changed, |_| ());
        let builder = on::<ResourceListChanged, _>(builder, self.resources_changed, |_| ());
        let builder = on::<PromptListChanged, _>(builder, self.prompts_changed, |_| ());
        on::<LoggingMessage, _>(builder, self.log_message, |p| p)
    }
}

fn on<N, T>(
    builder: SessionBuilder,
    callback: Option<Callback<T>>,
    map: fn(N::Params) -> T,
) -> SessionBuilder
where
    N: McpNotification,
    T: 'static,
{
    let Some(callback) = callback else {
        return builder;
    };
    builder.on::<N, _, _>(move |params, _peer| {
        callback(map(params));
        async {}
    })
}
