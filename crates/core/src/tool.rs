//! Tool traits: the abstraction over agent capabilities.
//!
//! A tool is either synchronous or asynchronous. Both are wrapped in the
//! [`ToolHandle`] tagged union, which exposes a single async `invoke`
//! contract so callers never branch on invocation style.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::ToolDefinition;
use crate::error::ToolError;

/// How the underlying callable is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    Sync,
    Async,
}

impl std::fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Async => write!(f, "async"),
        }
    }
}

/// A blocking tool. Runs on the blocking thread pool when invoked.
pub trait SyncTool: Send + Sync {
    /// A description of what this tool does (sent to the engine).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// A tool whose work is a suspending operation (network, process, ...).
#[async_trait]
pub trait AsyncTool: Send + Sync {
    /// A description of what this tool does (sent to the engine).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// A resolved callable, tagged with its invocation mode.
#[derive(Clone)]
pub enum ToolHandle {
    Sync(Arc<dyn SyncTool>),
    Async(Arc<dyn AsyncTool>),
}

impl ToolHandle {
    pub fn sync(tool: impl SyncTool + 'static) -> Self {
        Self::Sync(Arc::new(tool))
    }

    pub fn asynchronous(tool: impl AsyncTool + 'static) -> Self {
        Self::Async(Arc::new(tool))
    }

    pub fn mode(&self) -> InvocationMode {
        match self {
            Self::Sync(_) => InvocationMode::Sync,
            Self::Async(_) => InvocationMode::Async,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Sync(t) => t.description(),
            Self::Async(t) => t.description(),
        }
    }

    pub fn parameters_schema(&self) -> serde_json::Value {
        match self {
            Self::Sync(t) => t.parameters_schema(),
            Self::Async(t) => t.parameters_schema(),
        }
    }

    /// Build the definition sent to the engine under the given name.
    pub fn definition(&self, name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// Invoke the tool. Identical contract for both modes.
    pub async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        match self {
            Self::Sync(tool) => {
                let tool = Arc::clone(tool);
                tokio::task::spawn_blocking(move || tool.call(arguments))
                    .await
                    .map_err(|e| ToolError::ExecutionFailed {
                        tool_name: "sync tool".into(),
                        reason: format!("blocking task failed: {e}"),
                    })?
            }
            Self::Async(tool) => tool.call(arguments).await,
        }
    }
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle")
            .field("mode", &self.mode())
            .field("description", &self.description())
            .finish()
    }
}

/// A synchronous tool backed by a closure.
pub struct FnTool<F> {
    description: String,
    schema: serde_json::Value,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(serde_json::Value) -> Result<serde_json::Value, ToolError> + Send + Sync,
{
    pub fn new(description: impl Into<String>, schema: serde_json::Value, func: F) -> Self {
        Self {
            description: description.into(),
            schema,
            func,
        }
    }
}

impl<F> SyncTool for FnTool<F>
where
    F: Fn(serde_json::Value) -> Result<serde_json::Value, ToolError> + Send + Sync,
{
    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        (self.func)(arguments)
    }
}

/// Render a tool result value as prompt text: strings verbatim, everything
/// else as compact JSON.
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl AsyncTool for EchoTool {
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Ok(arguments["text"].clone())
        }
    }

    fn doubler() -> ToolHandle {
        ToolHandle::sync(FnTool::new(
            "Doubles n",
            serde_json::json!({"type": "object"}),
            |args| {
                let n = args["n"]
                    .as_i64()
                    .ok_or_else(|| ToolError::InvalidArguments("missing n".into()))?;
                Ok(serde_json::json!(n * 2))
            },
        ))
    }

    #[tokio::test]
    async fn sync_and_async_share_contract() {
        let echo = ToolHandle::asynchronous(EchoTool);
        let double = doubler();
        assert_eq!(echo.mode(), InvocationMode::Async);
        assert_eq!(double.mode(), InvocationMode::Sync);

        let a = echo.invoke(serde_json::json!({"text": "hi"})).await.unwrap();
        let b = double.invoke(serde_json::json!({"n": 21})).await.unwrap();
        assert_eq!(a, serde_json::json!("hi"));
        assert_eq!(b, serde_json::json!(42));
    }

    #[tokio::test]
    async fn sync_tool_errors_pass_through() {
        let err = doubler().invoke(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn definition_uses_given_name() {
        let def = doubler().definition("double");
        assert_eq!(def.name, "double");
        assert_eq!(def.description, "Doubles n");
    }

    #[test]
    fn render_value_unquotes_strings() {
        assert_eq!(render_value(&serde_json::json!("55")), "55");
        assert_eq!(render_value(&serde_json::json!({"a": 1})), "{\"a\":1}");
    }
}
