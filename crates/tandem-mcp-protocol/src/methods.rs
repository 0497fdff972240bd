//! Typed method contracts.
//!
//! Each MCP method is a zero-sized marker type that binds its wire name to its
//! params and result types, so both ends of a session agree on a payload shape
//! at compile time. Absent params are decoded as `{}`.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::completion::{CompleteParams, CompleteResult};
use crate::initialize::{InitializeParams, InitializeResult};
use crate::logging::{LoggingMessageParams, SetLevelParams};
use crate::meta::PaginatedParams;
use crate::notifications::{CancelledParams, ProgressParams, ResourceUpdatedParams};
use crate::ping::{EmptyParams, EmptyResult};
use crate::prompts::{GetPromptParams, GetPromptResult, ListPromptsResult};
use crate::resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceResult, ResourceUriParams,
};
use crate::roots::ListRootsResult;
use crate::sampling::{CreateMessageParams, CreateMessageResult};
use crate::tools::{CallToolParams, CallToolResult, ListToolsResult};

/// A request method and its payload types
pub trait McpRequest: Send + Sync + 'static {
    const METHOD: &'static str;
    type Params: Serialize + DeserializeOwned + Send + Sync + 'static;
    type Result: Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// A notification method and its params type
pub trait McpNotification: Send + Sync + 'static {
    const METHOD: &'static str;
    type Params: Serialize + DeserializeOwned + Send + Sync + 'static;
}

macro_rules! mcp_request {
    ($(#[$doc:meta])* $name:ident, $method:literal, $params:ty => $result:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl McpRequest for $name {
            const METHOD: &'static str = $method;
            type Params = $params;
            type Result = $result;
        }
    };
}

macro_rules! mcp_notification {
    ($(#[$doc:meta])* $name:ident, $method:literal, $params:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl McpNotification for $name {
            const METHOD: &'static str = $method;
            type Params = $params;
        }
    };
}

mcp_request!(Initialize, "initialize", InitializeParams => InitializeResult);
mcp_request!(
    /// Legal in every lifecycle state but Closed
    Ping, "ping", EmptyParams => EmptyResult
);
mcp_request!(ListTools, "tools/list", PaginatedParams => ListToolsResult);
mcp_request!(CallTool, "tools/call", CallToolParams => CallToolResult);
mcp_request!(ListResources, "resources/list", PaginatedParams => ListResourcesResult);
mcp_request!(
    ListResourceTemplates,
    "resources/templates/list",
    PaginatedParams => ListResourceTemplatesResult
);
mcp_request!(ReadResource, "resources/read", ResourceUriParams => ReadResourceResult);
mcp_request!(Subscribe, "resources/subscribe", ResourceUriParams => EmptyResult);
mcp_request!(Unsubscribe, "resources/unsubscribe", ResourceUriParams => EmptyResult);
mcp_request!(ListPrompts, "prompts/list", PaginatedParams => ListPromptsResult);
mcp_request!(GetPrompt, "prompts/get", GetPromptParams => GetPromptResult);
mcp_request!(
    /// Server to client
    CreateMessage, "sampling/createMessage", CreateMessageParams => CreateMessageResult
);
mcp_request!(
    /// Server to client
    ListRoots, "roots/list", EmptyParams => ListRootsResult
);
mcp_request!(SetLevel, "logging/setLevel", SetLevelParams => EmptyResult);
mcp_request!(Complete, "completion/complete", CompleteParams => CompleteResult);

mcp_notification!(Initialized, "notifications/initialized", EmptyParams);
mcp_notification!(Cancelled, "notifications/cancelled", CancelledParams);
mcp_notification!(Progress, "notifications/progress", ProgressParams);
mcp_notification!(
    ResourceListChanged,
    "notifications/resources/list_changed",
    EmptyParams
);
mcp_notification!(
    ResourceUpdated,
    "notifications/resources/updated",
    ResourceUpdatedParams
);
mcp_notification!(
    PromptListChanged,
    "notifications/prompts/list_changed",
    EmptyParams
);
mcp_notification!(ToolListChanged, "notifications/tools/list_changed", EmptyParams);
mcp_notification!(RootsListChanged, "notifications/roots/list_changed", EmptyParams);
mcp_notification!(LoggingMessage, "notifications/message", LoggingMessageParams);
