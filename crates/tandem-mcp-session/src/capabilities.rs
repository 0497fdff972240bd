//! Capability Registry
//!
//! Holds both peers' declarations. The local set is fixed at construction and
//! the remote set is written exactly once, when `initialize` completes, after
//! which the pair is frozen for the rest of the session.
//!
//! Every capability-gated method has a single *holder*: the side whose
//! declaration must contain the feature. For requests that is the side serving
//! the method, for notifications the side emitting it. The check therefore
//! reads the same whichever direction the message travels.

use std::fmt;
use std::sync::OnceLock;

use tandem_mcp_protocol::methods::{
    CallTool, Complete, CreateMessage, GetPrompt, ListPrompts, ListResourceTemplates,
    ListResources, ListRoots, ListTools, LoggingMessage, McpNotification, McpRequest,
    PromptListChanged, ReadResource, ResourceListChanged, ResourceUpdated, RootsListChanged,
    SetLevel, Subscribe, ToolListChanged, Unsubscribe,
};
use tandem_mcp_protocol::{ClientCapabilities, ServerCapabilities};

use crate::lifecycle::SessionRole;

/// A feature flag a method depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Tools,
    ToolsListChanged,
    Resources,
    ResourcesSubscribe,
    ResourcesListChanged,
    Prompts,
    PromptsListChanged,
    Logging,
    Completions,
    Sampling,
    Roots,
    RootsListChanged,
}

impl Requirement {
    /// The requirement for a method, if it is capability-gated at all
    pub fn for_method(method: &str) -> Option<Self> {
        let requirement = match method {
            m if m == ListTools::METHOD || m == CallTool::METHOD => Requirement::Tools,
            m if m == ToolListChanged::METHOD => Requirement::ToolsListChanged,
            m if m == ListResources::METHOD
                || m == ListResourceTemplates::METHOD
                || m == ReadResource::METHOD =>
            {
                Requirement::Resources
            }
            m if m == Subscribe::METHOD
                || m == Unsubscribe::METHOD
                || m == ResourceUpdated::METHOD =>
            {
                Requirement::ResourcesSubscribe
            }
            m if m == ResourceListChanged::METHOD => Requirement::ResourcesListChanged,
            m if m == ListPrompts::METHOD || m == GetPrompt::METHOD => Requirement::Prompts,
            m if m == PromptListChanged::METHOD => Requirement::PromptsListChanged,
            m if m == SetLevel::METHOD || m == LoggingMessage::METHOD => Requirement::Logging,
            m if m == Complete::METHOD => Requirement::Completions,
            m if m == CreateMessage::METHOD => Requirement::Sampling,
            m if m == ListRoots::METHOD => Requirement::Roots,
            m if m == RootsListChanged::METHOD => Requirement::RootsListChanged,
            _ => return None,
        };
        Some(requirement)
    }

    /// Side whose declaration must contain the feature
    pub fn holder(&self) -> SessionRole {
        match self {
            Requirement::Sampling | Requirement::Roots | Requirement::RootsListChanged => {
                SessionRole::Client
            }
            _ => SessionRole::Server,
        }
    }

    fn satisfied_by_server(&self, caps: &ServerCapabilities) -> bool {
        match self {
            Requirement::Tools => caps.supports_tools(),
            Requirement::ToolsListChanged => caps.tools_list_changed(),
            Requirement::Resources => caps.supports_resources(),
            Requirement::ResourcesSubscribe => caps.resources_subscribe(),
            Requirement::ResourcesListChanged => caps.resources_list_changed(),
            Requirement::Prompts => caps.supports_prompts(),
            Requirement::PromptsListChanged => caps.prompts_list_changed(),
            Requirement::Logging => caps.supports_logging(),
            Requirement::Completions => caps.supports_completions(),
            _ => false,
        }
    }

    fn satisfied_by_client(&self, caps: &ClientCapabilities) -> bool {
        match self {
            Requirement::Sampling => caps.supports_sampling(),
            Requirement::Roots => caps.supports_roots(),
            Requirement::RootsListChanged => caps.roots_list_changed(),
            _ => false,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Requirement::Tools => "server capability 'tools'",
            Requirement::ToolsListChanged => "server capability 'tools.listChanged'",
            Requirement::Resources => "server capability 'resources'",
            Requirement::ResourcesSubscribe => "server capability 'resources.subscribe'",
            Requirement::ResourcesListChanged => "server capability 'resources.listChanged'",
            Requirement::Prompts => "server capability 'prompts'",
            Requirement::PromptsListChanged => "server capability 'prompts.listChanged'",
            Requirement::Logging => "server capability 'logging'",
            Requirement::Completions => "server capability 'completions'",
            Requirement::Sampling => "client capability 'sampling'",
            Requirement::Roots => "client capability 'roots'",
            Requirement::RootsListChanged => "client capability 'roots.listChanged'",
        };
        f.write_str(name)
    }
}

/// Both declared capability sets of one session
pub struct CapabilityRegistry {
    role: SessionRole,
    client: OnceLock<ClientCapabilities>,
    server: OnceLock<ServerCapabilities>,
}

impl CapabilityRegistry {
    pub fn for_client(local: ClientCapabilities) -> Self {
        let client = OnceLock::new();
        let _ = client.set(local);
        Self {
            role: SessionRole::Client,
            client,
            server: OnceLock::new(),
        }
    }

    pub fn for_server(local: ServerCapabilities) -> Self {
        let server = OnceLock::new();
        let _ = server.set(local);
        Self {
            role: SessionRole::Server,
            client: OnceLock::new(),
            server,
        }
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Record the server's declaration. Only the first call has effect.
    pub fn freeze_remote_server(&self, caps: ServerCapabilities) -> bool {
        self.role == SessionRole::Client && self.server.set(caps).is_ok()
    }

    /// Record the client's declaration. Only the first call has effect.
    pub fn freeze_remote_client(&self, caps: ClientCapabilities) -> bool {
        self.role == SessionRole::Server && self.client.set(caps).is_ok()
    }

    pub fn client(&self) -> Option<&ClientCapabilities> {
        self.client.get()
    }

    pub fn server(&self) -> Option<&ServerCapabilities> {
        self.server.get()
    }

    pub fn is_negotiated(&self) -> bool {
        self.client.get().is_some() && self.server.get().is_some()
    }

    /// Check a method against the holder's declaration.
    ///
    /// Methods that no capability governs always pass. Before negotiation the
    /// remote set is unknown and gated methods fail.
    pub fn check(&self, method: &str) -> Result<(), Requirement> {
        let Some(requirement) = Requirement::for_method(method) else {
            return Ok(());
        };
        let satisfied = match requirement.holder() {
            SessionRole::Server => self
                .server
                .get()
                .is_some_and(|caps| requirement.satisfied_by_server(caps)),
            SessionRole::Client => self
                .client
                .get()
                .is_some_and(|caps| requirement.satisfied_by_client(caps)),
        };
        if satisfied { Ok(()) } else { Err(requirement) }
    }
}
