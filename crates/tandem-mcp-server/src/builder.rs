//! MCP Server Builder
//!
//! Capabilities are derived from what gets registered: a server with tools
//! declares `tools`, one with resources declares `resources` with
//! subscriptions, and so on. The `with_*` methods declare a capability for a
//! server that will only register components at runtime.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tandem_mcp_protocol::{Implementation, McpVersion, ServerCapabilities};
use tandem_mcp_session::{PaginationConfig, SessionConfig};

use crate::resource::TemplateEntry;
use crate::server::Components;
use crate::{
    McpCompletion, McpFrameworkError, McpPrompt, McpResource, McpResourceTemplate, McpServer,
    McpTool, Result,
};

/// Builder for MCP servers
pub struct McpServerBuilder {
    name: String,
    version: String,
    title: Option<String>,
    instructions: Option<String>,

    tools: BTreeMap<String, Arc<dyn McpTool>>,
    resources: BTreeMap<String, Arc<dyn McpResource>>,
    templates: Vec<Arc<dyn McpResourceTemplate>>,
    prompts: BTreeMap<String, Arc<dyn McpPrompt>>,
    completions: Vec<Arc<dyn McpCompletion>>,

    /// Declare capabilities even with nothing registered yet
    declare_tools: bool,
    declare_resources: bool,
    declare_prompts: bool,
    logging: bool,
    list_changed: bool,

    session_config: SessionConfig,
    pagination: PaginationConfig,

    /// Validation errors collected during builder configuration
    validation_errors: Vec<String>,
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            name: "tandem-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            instructions: None,
            tools: BTreeMap::new(),
            resources: BTreeMap::new(),
            templates: Vec::new(),
            prompts: BTreeMap::new(),
            completions: Vec::new(),
            declare_tools: false,
            declare_resources: false,
            declare_prompts: false,
            logging: false,
            list_changed: false,
            session_config: SessionConfig::default(),
            pagination: PaginationConfig::default(),
            validation_errors: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Returned to clients in the `initialize` result
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tool<T: McpTool + 'static>(mut self, tool: T) -> Self {
        let name = tool.definition().name;
        if self.tools.insert(name.clone(), Arc::new(tool)).is_some() {
            self.validation_errors
                .push(format!("tool '{}' registered twice", name));
        }
        self
    }

    pub fn tools<T: McpTool + 'static, I: IntoIterator<Item = T>>(self, tools: I) -> Self {
        tools.into_iter().fold(self, |builder, tool| builder.tool(tool))
    }

    pub fn resource<R: McpResource + 'static>(mut self, resource: R) -> Self {
        let uri = resource.definition().uri;
        if self.resources.insert(uri.clone(), Arc::new(resource)).is_some() {
            self.validation_errors
                .push(format!("resource '{}' registered twice", uri));
        }
        self
    }

    pub fn resource_template<R: McpResourceTemplate + 'static>(mut self, template: R) -> Self {
        self.templates.push(Arc::new(template));
        self
    }

    pub fn prompt<P: McpPrompt + 'static>(mut self, prompt: P) -> Self {
        let name = prompt.definition().name;
        if self.prompts.insert(name.clone(), Arc::new(prompt)).is_some() {
            self.validation_errors
                .push(format!("prompt '{}' registered twice", name));
        }
        self
    }

    pub fn completion_provider<C: McpCompletion + 'static>(mut self, completion: C) -> Self {
        self.completions.push(Arc::new(completion));
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.declare_tools = true;
        self
    }

    pub fn with_resources(mut self) -> Self {
        self.declare_resources = true;
        self
    }

    pub fn with_prompts(mut self) -> Self {
        self.declare_prompts = true;
        self
    }

    /// Declare `logging`, enabling `logging/setLevel` and `notifications/message`
    pub fn with_logging(mut self) -> Self {
        self.logging = true;
        self
    }

    /// Declare `listChanged` for tools, resources and prompts, for servers
    /// that add or remove components while serving
    pub fn with_list_changed(mut self) -> Self {
        self.list_changed = true;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.session_config.request_timeout = timeout;
        self
    }

    pub fn protocol_versions(mut self, versions: Vec<McpVersion>) -> Self {
        self.session_config.supported_versions = versions;
        self
    }

    /// Items per page for every `*/list` result
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.pagination.page_size = page_size;
        self
    }

    fn derive_capabilities(&self) -> ServerCapabilities {
        let mut capabilities = ServerCapabilities::default();
        if self.declare_tools || !self.tools.is_empty() {
            capabilities = capabilities.with_tools(self.list_changed);
        }
        let has_resources = !self.resources.is_empty() || !self.templates.is_empty();
        if self.declare_resources || has_resources {
            capabilities = capabilities.with_resources(true, self.list_changed);
        }
        if self.declare_prompts || !self.prompts.is_empty() {
            capabilities = capabilities.with_prompts(self.list_changed);
        }
        if !self.completions.is_empty() {
            capabilities = capabilities.with_completions();
        }
        if self.logging {
            capabilities = capabilities.with_logging();
        }
        capabilities
    }

    pub fn build(self) -> Result<McpServer> {
        if self.name.is_empty() {
            return Err(McpFrameworkError::Config("Server name cannot be empty".to_string()));
        }
        if self.version.is_empty() {
            return Err(McpFrameworkError::Config("Server version cannot be empty".to_string()));
        }
        if !self.validation_errors.is_empty() {
            return Err(McpFrameworkError::Config(self.validation_errors.join("; ")));
        }
        self.session_config.validate()?;

        let capabilities = self.derive_capabilities();
        let templates = self
            .templates
            .into_iter()
            .map(TemplateEntry::new)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut implementation = Implementation::new(self.name, self.version);
        if let Some(title) = self.title {
            implementation = implementation.with_title(title);
        }

        Ok(McpServer::new(
            implementation,
            capabilities,
            self.instructions,
            self.session_config,
            self.pagination,
            Components {
                tools: self.tools,
                resources: self.resources,
                templates,
                prompts: self.prompts,
                completions: self.completions,
            },
        ))
    }
}
