//! MCP Completion Trait
//!
//! Completion providers suggest values for a prompt argument or a resource
//! template variable. The server asks the first provider whose `can_handle`
//! accepts the reference and truncates its candidates to the wire limit.

use async_trait::async_trait;

use tandem_mcp_protocol::completion::CompleteArgument;
use tandem_mcp_protocol::{CompletionReference, McpResult};
use tandem_mcp_session::RequestContext;

#[async_trait]
pub trait McpCompletion: Send + Sync {
    fn can_handle(&self, reference: &CompletionReference, argument: &str) -> bool;

    /// Every candidate for the partial value, best first
    async fn complete(
        &self,
        reference: &CompletionReference,
        argument: &CompleteArgument,
        ctx: RequestContext,
    ) -> McpResult<Vec<String>>;
}

/// Fixed candidate list for one argument, filtered by prefix
#[derive(Debug, Clone)]
pub struct StaticCompletion {
    reference: CompletionReference,
    argument: String,
    values: Vec<String>,
}

impl StaticCompletion {
    pub fn for_prompt(
        prompt: impl Into<String>,
        argument: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(
            CompletionReference::Prompt {
                name: prompt.into(),
            },
            argument,
            values,
        )
    }

    pub fn for_resource(
        uri_template: impl Into<String>,
        variable: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(
            CompletionReference::Resource {
                uri: uri_template.into(),
            },
            variable,
            values,
        )
    }

    fn new(
        reference: CompletionReference,
        argument: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            reference,
            argument: argument.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn matching(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        self.values
            .iter()
            .filter(|value| value.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl McpCompletion for StaticCompletion {
    fn can_handle(&self, reference: &CompletionReference, argument: &str) -> bool {
        *reference == self.reference && argument == self.argument
    }

    async fn complete(
        &self,
        _reference: &CompletionReference,
        argument: &CompleteArgument,
        _ctx: RequestContext,
    ) -> McpResult<Vec<String>> {
        Ok(self.matching(&argument.value))
    }
}
