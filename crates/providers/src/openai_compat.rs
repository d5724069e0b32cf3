//! OpenAI-compatible reasoning engine.
//!
//! Works with any `/chat/completions` endpoint: Gemini's OpenAI-compatible
//! surface (the default), OpenAI, OpenRouter, Ollama, vLLM.
//!
//! Non-streaming only; tool calls are returned as part of the response.

use async_trait::async_trait;
use ltm_config::EngineSettings;
use ltm_core::engine::{EngineRequest, EngineResponse, ReasoningEngine, ToolDefinition, Usage};
use ltm_core::error::ReasoningEngineError;
use ltm_core::message::{Message, MessageToolCall, Role};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible reasoning engine.
pub struct OpenAiCompatEngine {
    name: String,
    base_url: String,
    api_key: Option<String>,
    /// Variable the key should have come from, reported when it is missing
    api_key_env: String,
    client: reqwest::Client,
}

impl OpenAiCompatEngine {
    /// Create a new engine. A `None` key is reported on the first call.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            api_key_env: ltm_config::settings::DEFAULT_API_KEY_ENV.to_string(),
            client,
        }
    }

    /// Build an engine from environment-derived settings.
    pub fn from_settings(settings: &EngineSettings) -> Self {
        let mut engine = Self::new(
            "gemini",
            settings.base_url.clone(),
            settings.api_key.clone(),
            Duration::from_secs(settings.timeout_secs),
        );
        engine.api_key_env = settings.api_key_env.clone();
        engine
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &EngineRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "stream": false,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }
        body
    }

    fn parse_response(api_response: ApiResponse) -> Result<EngineResponse, ReasoningEngineError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ReasoningEngineError::MalformedResponse("No choices in response".into()))?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(EngineResponse {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: api_response.model,
        })
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiCompatEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: EngineRequest,
    ) -> std::result::Result<EngineResponse, ReasoningEngineError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ReasoningEngineError::MissingCredential(self.api_key_env.clone()))?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(engine = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReasoningEngineError::Timeout(e.to_string())
                } else {
                    ReasoningEngineError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ReasoningEngineError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ReasoningEngineError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Engine returned error");
            return Err(ReasoningEngineError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            ReasoningEngineError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;

        Self::parse_response(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EngineRequest {
        EngineRequest {
            model: "gemini-2.5-flash-lite".into(),
            messages: vec![Message::system("You are helpful"), Message::user("Hello")],
            temperature: None,
            max_tokens: Some(256),
            tools: vec![ToolDefinition {
                name: "calculate_fibonacci".into(),
                description: "Fibonacci".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
        }
    }

    #[test]
    fn settings_constructor_trims_url() {
        let settings = EngineSettings {
            base_url: "http://localhost:11434/v1/".into(),
            ..EngineSettings::default()
        };
        let engine = OpenAiCompatEngine::from_settings(&settings);
        assert_eq!(engine.name(), "gemini");
        assert_eq!(engine.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn message_conversion() {
        let api_messages = OpenAiCompatEngine::to_api_messages(&request().messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn body_omits_unset_temperature() {
        let body = OpenAiCompatEngine::request_body(&request());
        assert!(body.get("temperature").is_none());
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["tools"][0]["function"]["name"], "calculate_fibonacci");
        assert_eq!(body["tools"][0]["type"], "function");
    }

    #[test]
    fn parses_tool_call_response() {
        let raw = serde_json::json!({
            "model": "gemini-2.5-flash-lite",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "calculate_fibonacci", "arguments": "{\"n\":10}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });
        let api: ApiResponse = serde_json::from_value(raw).unwrap();
        let resp = OpenAiCompatEngine::parse_response(api).unwrap();
        assert_eq!(resp.text, "");
        assert_eq!(resp.tool_calls[0].name, "calculate_fibonacci");
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn empty_choices_is_malformed() {
        let api: ApiResponse =
            serde_json::from_value(serde_json::json!({"model": "m", "choices": []})).unwrap();
        let err = OpenAiCompatEngine::parse_response(api).unwrap_err();
        assert!(matches!(err, ReasoningEngineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn missing_key_fails_on_first_call() {
        let settings = EngineSettings {
            api_key_env: "MY_ENGINE_KEY".into(),
            ..EngineSettings::default()
        };
        let engine = OpenAiCompatEngine::from_settings(&settings);
        let err = engine.generate(request()).await.unwrap_err();
        assert_eq!(err, ReasoningEngineError::MissingCredential("MY_ENGINE_KEY".into()));
    }
}
