//! Shared test helpers for agent tests.

use ltm_config::AgentKind;
use ltm_core::engine::{EngineRequest, EngineResponse, ReasoningEngine, Usage};
use ltm_core::error::ReasoningEngineError;
use ltm_core::message::MessageToolCall;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::agents::{AgentProfile, EngineBinding};

/// An engine that replays a script of responses.
///
/// Each call to `generate` returns the next entry. Once the script runs out
/// the last entry repeats; an empty script panics.
pub struct ScriptedEngine {
    script: Vec<Result<EngineResponse, ReasoningEngineError>>,
    requests: Mutex<Vec<EngineRequest>>,
    latency: Option<Duration>,
}

impl ScriptedEngine {
    pub fn new(responses: Vec<EngineResponse>) -> Self {
        Self {
            script: responses.into_iter().map(Ok).collect(),
            requests: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn failing(error: ReasoningEngineError) -> Self {
        Self {
            script: vec![Err(error)],
            requests: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Sleep this long before every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The user message of the n-th request (0-based).
    pub fn prompt(&self, n: usize) -> String {
        self.requests()[n]
            .messages
            .iter()
            .rev()
            .find(|m| m.role == ltm_core::message::Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ReasoningEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: EngineRequest) -> Result<EngineResponse, ReasoningEngineError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        assert!(!self.script.is_empty(), "ScriptedEngine: empty script");
        self.script[index.min(self.script.len() - 1)].clone()
    }
}

/// A text response (no tool calls).
pub fn make_text_response(text: &str) -> EngineResponse {
    EngineResponse {
        text: text.to_string(),
        tool_calls: Vec::new(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A response requesting one tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> EngineResponse {
    make_tool_calls("", vec![tool_call(name, args)])
}

/// A response with some text plus tool calls.
pub fn make_tool_calls(text: &str, calls: Vec<MessageToolCall>) -> EngineResponse {
    let mut response = make_text_response(text);
    response.tool_calls = calls;
    response
}

pub fn tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

pub fn binding(engine: Arc<ScriptedEngine>) -> EngineBinding {
    EngineBinding {
        engine,
        model: "mock-model".into(),
        temperature: None,
        max_tokens: None,
    }
}

pub fn profile(name: &str, kind: AgentKind, instruction: &str) -> AgentProfile {
    AgentProfile {
        name: name.into(),
        kind,
        instruction: instruction.into(),
        description: format!("{name} agent"),
        output_key: None,
    }
}
