//! Message types exchanged with the reasoning engine.
//!
//! Agents compose a fresh prompt for every engine call: a system message
//! carrying the agent instruction, a user message carrying the query (and,
//! for iterative agents, the full iteration history), and tool result
//! messages when a tool round has happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (or the upstream agent feeding this one)
    User,
    /// The reasoning engine
    Assistant,
    /// Agent instruction
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the engine (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

/// A tool call requested by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON string, exactly as the engine produced them
    pub arguments: String,
}

impl MessageToolCall {
    /// Parse the raw argument string.
    ///
    /// Engines do not always produce valid JSON; a non-JSON payload is passed
    /// through as a JSON string so the tool can still report what it got.
    pub fn parsed_arguments(&self) -> serde_json::Value {
        let raw = self.arguments.trim();
        if raw.is_empty() {
            return serde_json::json!({});
        }
        serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn tool_result_links_call_id() {
        let msg = Message::tool_result("call_1", "55");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn parsed_arguments_handles_bad_json() {
        let call = MessageToolCall {
            id: "c".into(),
            name: "fib".into(),
            arguments: "{\"n\": 10}".into(),
        };
        assert_eq!(call.parsed_arguments()["n"], 10);

        let broken = MessageToolCall {
            arguments: "n=10".into(),
            ..call.clone()
        };
        assert_eq!(broken.parsed_arguments(), serde_json::json!("n=10"));

        let empty = MessageToolCall {
            arguments: String::new(),
            ..call
        };
        assert_eq!(empty.parsed_arguments(), serde_json::json!({}));
    }
}
