//! Reasoning engine trait: the abstraction over LLM backends.
//!
//! The engine is an opaque remote collaborator: it receives a prompt
//! context and returns text plus zero or more requested tool calls.
//! It has no latency guarantee and may fail; agents surface failures as
//! [`ReasoningEngineError`] to the caller of the current iteration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReasoningEngineError;
use crate::message::{Message, MessageToolCall};

/// A single engine call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRequest {
    /// The model to use (e.g., "gemini-2.5-flash-lite")
    pub model: String,

    /// The prompt messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the engine may request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A tool definition sent to the engine so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The engine's answer to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResponse {
    /// Plan / verification / answer text
    pub text: String,

    /// Tool calls the engine wants executed, in request order
    #[serde(default)]
    pub tool_calls: Vec<MessageToolCall>,

    /// Token usage statistics
    #[serde(default)]
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

impl EngineResponse {
    /// A text-only response.
    pub fn text(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            usage: None,
            model: model.into(),
        }
    }

    /// Render this response as an assistant message (for tool rounds).
    pub fn to_message(&self) -> Message {
        let mut msg = Message::assistant(&self.text);
        msg.tool_calls = self.tool_calls.clone();
        msg
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core reasoning engine trait.
///
/// Implementations: OpenAI-compatible HTTP endpoints, retry wrappers, and
/// scripted engines in tests. Agents call `generate()` without knowing
/// which backend answers.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// A human-readable name (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// Send one prompt and wait for the complete response.
    async fn generate(
        &self,
        request: EngineRequest,
    ) -> std::result::Result<EngineResponse, ReasoningEngineError>;
}
