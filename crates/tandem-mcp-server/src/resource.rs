//! MCP Resource Traits
//!
//! [`McpResource`] serves one fixed URI. [`McpResourceTemplate`] serves a
//! family of URIs described by a [`UriTemplate`]; `resources/read` tries exact
//! resources first, then templates in registration order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use tandem_mcp_protocol::{McpResult, Resource, ResourceContents, ResourceTemplate};
use tandem_mcp_session::RequestContext;

use crate::uri_template::UriTemplate;

#[async_trait]
pub trait McpResource: Send + Sync {
    /// Descriptor advertised by `resources/list`
    fn definition(&self) -> Resource;

    async fn read(&self, ctx: RequestContext) -> McpResult<Vec<ResourceContents>>;
}

#[async_trait]
pub trait McpResourceTemplate: Send + Sync {
    /// Descriptor advertised by `resources/templates/list`
    fn definition(&self) -> ResourceTemplate;

    /// Read a concrete URI that matched the template
    async fn read(
        &self,
        uri: &str,
        variables: HashMap<String, String>,
        ctx: RequestContext,
    ) -> McpResult<Vec<ResourceContents>>;
}

/// A resource whose content is fixed text
#[derive(Debug, Clone)]
pub struct TextResource {
    definition: Resource,
    text: String,
}

impl TextResource {
    pub fn new(uri: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            definition: Resource::new(uri, name).with_mime_type("text/plain"),
            text: text.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.definition = self.definition.with_description(description);
        self
    }
}

#[async_trait]
impl McpResource for TextResource {
    fn definition(&self) -> Resource {
        self.definition.clone()
    }

    async fn read(&self, _ctx: RequestContext) -> McpResult<Vec<ResourceContents>> {
        Ok(vec![ResourceContents::text(&self.definition.uri, &self.text)])
    }
}

/// A registered template with its compiled matcher
pub(crate) struct TemplateEntry {
    pub(crate) matcher: UriTemplate,
    pub(crate) template: Arc<dyn McpResourceTemplate>,
}

impl TemplateEntry {
    pub(crate) fn new(template: Arc<dyn McpResourceTemplate>) -> McpResult<Self> {
        let matcher = UriTemplate::new(&template.definition().uri_template)?;
        Ok(Self { matcher, template })
    }
}
