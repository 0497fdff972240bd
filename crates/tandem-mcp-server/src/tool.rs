//! MCP Tool Trait
//!
//! Tools are the server's callable functions. Implement [`McpTool`] directly
//! for full control, or assemble one at runtime with [`ToolBuilder`].
//!
//! A tool that fails returns an error; the server reports it to the caller as
//! a `CallToolResult` with `isError: true` rather than a JSON-RPC error, so
//! the model can see what went wrong.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::future::Future;
use std::pin::Pin;

use tandem_mcp_protocol::tools::ToolAnnotations;
use tandem_mcp_protocol::{CallToolResult, McpError, McpResult, Tool};
use tandem_mcp_session::RequestContext;

#[async_trait]
pub trait McpTool: Send + Sync {
    /// Descriptor advertised by `tools/list`
    fn definition(&self) -> Tool;

    /// Execute the tool. `args` is always a JSON object.
    async fn call(&self, args: Value, ctx: RequestContext) -> McpResult<CallToolResult>;
}

/// Boxed execution function of a [`DynamicTool`]
pub type DynamicToolFn = Box<
    dyn Fn(Value, RequestContext) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>
        + Send
        + Sync,
>;

/// Builder for creating tools at runtime
pub struct ToolBuilder {
    name: String,
    title: Option<String>,
    description: Option<String>,
    properties: Map<String, Value>,
    required: Vec<String>,
    annotations: Option<ToolAnnotations>,
    execute_fn: Option<DynamicToolFn>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            properties: Map::new(),
            required: Vec::new(),
            annotations: None,
            execute_fn: None,
        }
    }

    /// Set the tool title (display name)
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an optional parameter with an explicit JSON schema
    pub fn param(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn required_param(mut self, name: impl Into<String>, schema: Value) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.param(name, schema)
    }

    pub fn string_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.required_param(name, typed_schema("string", description))
    }

    pub fn number_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.required_param(name, typed_schema("number", description))
    }

    pub fn integer_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.required_param(name, typed_schema("integer", description))
    }

    pub fn boolean_param(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.required_param(name, typed_schema("boolean", description))
    }

    pub fn annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Set the execution function.
    ///
    /// A returned string becomes the text content. Any other value is sent as
    /// JSON text, and objects are also attached as structured content.
    pub fn execute<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.execute_with_context(move |args, _ctx| f(args))
    }

    /// Like [`execute`](Self::execute), with access to the request context
    /// for progress, logging, cancellation and requests back to the client
    pub fn execute_with_context<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.execute_fn = Some(Box::new(move |args, ctx| Box::pin(f(args, ctx))));
        self
    }

    pub fn build(self) -> Result<DynamicTool, String> {
        let execute_fn = self.execute_fn.ok_or("Execution function is required")?;
        if self.name.is_empty() {
            return Err("Tool name must not be empty".to_string());
        }

        let mut input_schema = json!({
            "type": "object",
            "properties": Value::Object(self.properties),
        });
        if !self.required.is_empty() {
            input_schema["required"] = json!(self.required);
        }

        let mut definition = Tool::new(self.name, input_schema);
        definition.title = self.title;
        definition.description = self.description;
        definition.annotations = self.annotations;

        Ok(DynamicTool {
            definition,
            execute_fn,
        })
    }
}

fn typed_schema(kind: &str, description: impl Into<String>) -> Value {
    json!({ "type": kind, "description": description.into() })
}

/// Tool created by [`ToolBuilder`]
pub struct DynamicTool {
    definition: Tool,
    execute_fn: DynamicToolFn,
}

impl DynamicTool {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Run the execution function without the result conversion
    pub async fn execute(&self, args: Value, ctx: RequestContext) -> Result<Value, String> {
        (self.execute_fn)(args, ctx).await
    }
}

#[async_trait]
impl McpTool for DynamicTool {
    fn definition(&self) -> Tool {
        self.definition.clone()
    }

    async fn call(&self, args: Value, ctx: RequestContext) -> McpResult<CallToolResult> {
        let value = self
            .execute(args, ctx)
            .await
            .map_err(McpError::ToolExecutionError)?;
        Ok(match value {
            Value::String(text) => CallToolResult::text(text),
            Value::Object(_) => {
                CallToolResult::text(value.to_string()).with_structured_content(value)
            }
            other => CallToolResult::text(other.to_string()),
        })
    }
}

/// Fetch a numeric argument, with the message a model can act on
pub fn number_arg(args: &Value, name: &str) -> Result<f64, String> {
    args.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("Missing or invalid parameter '{}'", name))
}

/// Fetch a string argument
pub fn string_arg<'a>(args: &'a Value, name: &str) -> Result<&'a str, String> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Missing or invalid parameter '{}'", name))
}
