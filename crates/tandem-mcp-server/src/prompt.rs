//! MCP Prompt Trait
//!
//! Prompts are parameterised message templates. The server checks required
//! arguments against the prompt's declaration before `render` runs, so
//! implementations can index `args` for required names.

use async_trait::async_trait;
use std::collections::HashMap;

use tandem_mcp_protocol::{GetPromptResult, McpError, McpResult, Prompt, PromptMessage};
use tandem_mcp_session::RequestContext;

#[async_trait]
pub trait McpPrompt: Send + Sync {
    /// Descriptor advertised by `prompts/list`
    fn definition(&self) -> Prompt;

    async fn render(
        &self,
        args: HashMap<String, String>,
        ctx: RequestContext,
    ) -> McpResult<Vec<PromptMessage>>;

    /// Checks beyond required-argument presence
    async fn validate_args(&self, _args: &HashMap<String, String>) -> McpResult<()> {
        Ok(())
    }

    /// Validate, render and wrap into a `prompts/get` result
    async fn get_response(
        &self,
        args: HashMap<String, String>,
        ctx: RequestContext,
    ) -> McpResult<GetPromptResult> {
        let definition = self.definition();
        let missing = definition.missing_arguments(&args);
        if !missing.is_empty() {
            return Err(McpError::InvalidParameters(format!(
                "prompt '{}' is missing required arguments: {}",
                definition.name,
                missing.join(", ")
            )));
        }
        self.validate_args(&args).await?;

        let mut response = GetPromptResult::new(self.render(args, ctx).await?);
        if let Some(description) = definition.description {
            response = response.with_description(description);
        }
        Ok(response)
    }
}

/// Prompt whose messages substitute `{name}` placeholders with arguments
#[derive(Debug, Clone)]
pub struct TemplatePrompt {
    definition: Prompt,
    template: String,
}

impl TemplatePrompt {
    pub fn new(definition: Prompt, template: impl Into<String>) -> Self {
        Self {
            definition,
            template: template.into(),
        }
    }

    fn fill(&self, args: &HashMap<String, String>) -> String {
        args.iter().fold(self.template.clone(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
    }
}

#[async_trait]
impl McpPrompt for TemplatePrompt {
    fn definition(&self) -> Prompt {
        self.definition.clone()
    }

    async fn render(
        &self,
        args: HashMap<String, String>,
        _ctx: RequestContext,
    ) -> McpResult<Vec<PromptMessage>> {
        Ok(vec![PromptMessage::user(self.fill(&args))])
    }
}
