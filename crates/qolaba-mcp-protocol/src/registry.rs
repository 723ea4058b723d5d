//! Tool registry.
//!
//! Tools are registered once at startup with a name, description, JSON
//! schema, and an executor. The serve loop dispatches `tools/call` through
//! here.

use crate::protocol::McpTool;
use serde_json::Value;
use std::sync::Arc;

/// Trait for tool execution.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute the tool with given arguments. The Ok value is the tool's
    /// structured result; the Err string becomes an `is_error` tool result,
    /// not a protocol error.
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// A registered tool.
#[derive(Clone)]
pub struct RegisteredTool {
    /// Tool name/ID.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for parameters.
    pub input_schema: Value,
    /// Tool executor.
    pub executor: Arc<dyn ToolExecutor>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Builder for a registered tool.
pub struct ToolBuilder {
    name: String,
    description: String,
    input_schema: Value,
}

impl ToolBuilder {
    /// Create a new tool builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    /// Set the tool description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the parameters schema.
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Build the tool with an executor.
    pub fn build(self, executor: impl ToolExecutor + 'static) -> RegisteredTool {
        RegisteredTool {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            executor: Arc::new(executor),
        }
    }
}

/// Registry of the tools a server exposes. Listing preserves registration
/// order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with a duplicate name replaces the earlier
    /// registration.
    pub fn register(&mut self, tool: RegisteredTool) {
        self.tools.retain(|t| t.name != tool.name);
        self.tools.push(tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Protocol-facing tool listing.
    pub fn list(&self) -> Vec<McpTool> {
        self.tools
            .iter()
            .map(|tool| McpTool {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                input_schema: Some(tool.input_schema.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExecutor;

    #[async_trait::async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(&self, args: Value) -> Result<Value, String> {
            Ok(args)
        }
    }

    struct FailingExecutor;

    #[async_trait::async_trait]
    impl ToolExecutor for FailingExecutor {
        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Err("it broke".to_string())
        }
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolBuilder::new("echo")
                .description("Echo arguments back")
                .build(EchoExecutor),
        );

        let tool = registry.get("echo").unwrap();
        let result = tool
            .executor
            .execute(serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_executor_error_is_a_value() {
        let tool = ToolBuilder::new("broken").build(FailingExecutor);
        let err = tool.executor.execute(Value::Null).await.unwrap_err();
        assert_eq!(err, "it broke");
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolBuilder::new("a").description("first").build(EchoExecutor));
        registry.register(ToolBuilder::new("a").description("second").build(EchoExecutor));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().description, "second");
    }

    #[test]
    fn test_listing_preserves_order() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolBuilder::new("b").build(EchoExecutor));
        registry.register(ToolBuilder::new("a").build(EchoExecutor));

        let names: Vec<_> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_default_schema_is_object() {
        let tool = ToolBuilder::new("t").build(EchoExecutor);
        assert_eq!(tool.input_schema["type"], "object");
    }
}
