//! Tool invocation contract and registry.
//!
//! Concrete tools live outside the engine; only the invocation contract
//! matters here: a tool takes a JSON argument object and returns a
//! [`ToolResult`]. The dispatcher converts every [`ToolError`] into a
//! `ToolResult { error: true }` — a failing tool is data the model sees,
//! not an exception the caller catches.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::messages::ToolResult;

/// Tool category, used by the dependency-risk heuristic and for grouping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// File system operations.
    Filesystem,
    /// Shell/process execution.
    Shell,
    /// Search operations.
    Search,
    /// Network/HTTP operations.
    Network,
    /// Custom/user-defined.
    Custom,
}

/// Errors a tool may raise during invocation.
///
/// These never cross the engine boundary: the dispatcher catches them
/// locally and normalizes them into error results.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The arguments did not match the tool's expectations.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool itself failed.
    #[error("{0}")]
    Failed(String),
}

/// The tool invocation contract.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, as the model refers to it in call payloads.
    fn name(&self) -> &str;

    /// Tool category.
    fn category(&self) -> ToolCategory {
        ToolCategory::Custom
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult, ToolError>;
}

/// Name-keyed registry of the tools available to one engine.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name. A later registration with the
    /// same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let _ = self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Registered tool names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, args: Map<String, Value>) -> Result<ToolResult, ToolError> {
            let text = args
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidArguments("missing text".into()))?;
            Ok(ToolResult::ok("echoed", text))
        }
    }

    #[tokio::test]
    async fn registry_lookup_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let tool = registry.get("echo").expect("registered");
        let mut args = Map::new();
        let _ = args.insert("text".into(), Value::String("hi".into()));
        let result = tool.execute(args).await.unwrap();
        assert_eq!(result.content, "hi");
        assert!(!result.error);
    }

    #[tokio::test]
    async fn invalid_arguments_error() {
        let tool = EchoTool;
        let err = tool.execute(Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(err.to_string(), "invalid arguments: missing text");
    }

    #[test]
    fn unknown_tool_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get("nope").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn reregistration_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
    }
}
