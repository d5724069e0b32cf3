//! Uniform invocation wrapper around a resolved tool.
//!
//! Every call is logged with the tool name, arguments, duration and outcome,
//! and published as a [`DomainEvent::ToolExecuted`]. Tool errors come back
//! as data inside the returned [`ToolCallRecord`].

use chrono::{DateTime, Utc};
use ltm_core::engine::ToolDefinition;
use ltm_core::error::ToolError;
use ltm_core::event::{DomainEvent, EventBus};
use ltm_core::tool::{InvocationMode, ToolHandle, render_value};
use std::time::Instant;
use tracing::{info, warn};

/// A tool error captured as data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{tool}: {error}")]
pub struct ToolInvocationFailure {
    pub tool: String,
    pub error: ToolError,
}

/// One tool call: what was asked, what came back, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub tool: String,
    pub arguments: serde_json::Value,
    pub result: Result<serde_json::Value, ToolInvocationFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ToolCallRecord {
    /// A call that never reached a tool (unknown name, over the step limit,
    /// interrupted).
    pub fn failed(
        tool: impl Into<String>,
        arguments: serde_json::Value,
        error: ToolError,
        started_at: DateTime<Utc>,
    ) -> Self {
        let tool = tool.into();
        Self {
            result: Err(ToolInvocationFailure {
                tool: tool.clone(),
                error,
            }),
            tool,
            arguments,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The result as prompt text: the value, or `ERROR: <reason>`.
    pub fn render_result(&self) -> String {
        match &self.result {
            Ok(value) => render_value(value),
            Err(failure) => format!("ERROR: {}", failure.error),
        }
    }
}

/// A named, resolved tool.
#[derive(Debug, Clone)]
pub struct ToolProxy {
    name: String,
    locator: String,
    handle: ToolHandle,
}

impl ToolProxy {
    pub fn new(name: impl Into<String>, locator: impl Into<String>, handle: ToolHandle) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn mode(&self) -> InvocationMode {
        self.handle.mode()
    }

    pub fn definition(&self) -> ToolDefinition {
        self.handle.definition(&self.name)
    }

    /// Invoke the tool. Never fails: errors are captured in the record.
    pub async fn call(&self, arguments: serde_json::Value, events: &EventBus) -> ToolCallRecord {
        let started_at = Utc::now();
        let start = Instant::now();

        let result = self.handle.invoke(arguments.clone()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(
                tool = %self.name,
                mode = %self.mode(),
                arguments = %arguments,
                duration_ms,
                "Tool call succeeded"
            ),
            Err(e) => warn!(
                tool = %self.name,
                mode = %self.mode(),
                arguments = %arguments,
                duration_ms,
                error = %e,
                "Tool call failed"
            ),
        }

        events.publish(DomainEvent::ToolExecuted {
            tool_name: self.name.clone(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        ToolCallRecord {
            tool: self.name.clone(),
            arguments,
            result: result.map_err(|error| ToolInvocationFailure {
                tool: self.name.clone(),
                error,
            }),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ltm_core::tool::FnTool;

    fn failing() -> ToolProxy {
        ToolProxy::new(
            "flaky",
            "test:flaky",
            ToolHandle::sync(FnTool::new("Always fails", serde_json::json!({}), |_| {
                Err(ToolError::ExecutionFailed {
                    tool_name: "flaky".into(),
                    reason: "boom".into(),
                })
            })),
        )
    }

    #[tokio::test]
    async fn failure_is_captured_not_raised() {
        let events = EventBus::default();
        let record = failing().call(serde_json::json!({"x": 1}), &events).await;
        assert!(!record.is_success());
        assert_eq!(record.tool, "flaky");
        assert!(record.render_result().starts_with("ERROR:"));
        assert!(record.render_result().contains("boom"));
        assert!(record.started_at <= record.finished_at);
    }

    #[tokio::test]
    async fn every_call_is_published() {
        let events = EventBus::default();
        let proxy = ToolProxy::new(
            "double",
            "test:double",
            ToolHandle::sync(FnTool::new("Doubles", serde_json::json!({}), |args| {
                Ok(serde_json::json!(args["n"].as_i64().unwrap_or(0) * 2))
            })),
        );

        let ok = proxy.call(serde_json::json!({"n": 4}), &events).await;
        assert_eq!(ok.result, Ok(serde_json::json!(8)));
        failing().call(serde_json::json!({}), &events).await;

        let outcomes: Vec<(String, bool)> = events
            .history()
            .iter()
            .filter_map(|e| match e.as_ref() {
                DomainEvent::ToolExecuted { tool_name, success, .. } => {
                    Some((tool_name.clone(), *success))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            outcomes,
            vec![("double".to_string(), true), ("flaky".to_string(), false)]
        );
    }

    #[test]
    fn failed_record_for_calls_that_never_ran() {
        let record = ToolCallRecord::failed(
            "extra",
            serde_json::json!({}),
            ToolError::LimitExceeded { limit: 2 },
            Utc::now(),
        );
        assert!(record.render_result().contains("at most 2"));
    }
}
