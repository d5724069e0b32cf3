//! Code-executing agent and its sandbox seam.
//!
//! The agent asks the engine for an answer, runs every fenced code block in
//! that answer through a [`CodeSandbox`], and appends the output.

use async_trait::async_trait;
use chrono::Utc;
use ltm_core::error::ToolError;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{AgentProfile, EngineBinding, abandon, publish_iteration};
use crate::context::ExecutionContext;
use crate::outcome::{Outcome, OutcomeStatus};
use crate::session::{IterationStatus, SessionRecorder, ToolCallRecord};
use ltm_tools::ToolInvocationFailure;

/// Tool name used for sandbox runs in iteration records.
pub const SANDBOX_TOOL: &str = "code_sandbox";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ExecutionOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn render(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        let mut text = String::from(stdout);
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("[stderr]: ");
            text.push_str(stderr);
        }
        if !self.success() {
            let code = self.exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            text = format!("[exit code: {code}]\n{text}");
        }
        text
    }
}

/// Runs a piece of code somewhere isolated from the agent.
#[async_trait]
pub trait CodeSandbox: Send + Sync + std::fmt::Debug {
    async fn execute(&self, language: &str, code: &str) -> Result<ExecutionOutput, ToolError>;
}

/// Sandbox that runs code with a local interpreter process.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    /// language → (program, flag that takes the code as an argument)
    interpreters: BTreeMap<String, (String, String)>,
    default_language: String,
    timeout: Duration,
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        let interpreters = [
            ("python", "python3", "-c"),
            ("py", "python3", "-c"),
            ("sh", "sh", "-c"),
            ("bash", "bash", "-c"),
            ("shell", "sh", "-c"),
            ("javascript", "node", "-e"),
            ("js", "node", "-e"),
        ]
        .into_iter()
        .map(|(lang, program, flag)| (lang.to_string(), (program.to_string(), flag.to_string())))
        .collect();
        Self {
            interpreters,
            default_language: "python".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ProcessSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Language used for fences without an info string.
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into().to_lowercase();
        self
    }

    pub fn with_interpreter(
        mut self,
        language: impl Into<String>,
        program: impl Into<String>,
        flag: impl Into<String>,
    ) -> Self {
        self.interpreters
            .insert(language.into().to_lowercase(), (program.into(), flag.into()));
        self
    }
}

#[async_trait]
impl CodeSandbox for ProcessSandbox {
    async fn execute(&self, language: &str, code: &str) -> Result<ExecutionOutput, ToolError> {
        let language = if language.trim().is_empty() {
            self.default_language.as_str()
        } else {
            language
        };
        let (program, flag) = self
            .interpreters
            .get(&language.to_lowercase())
            .ok_or_else(|| ToolError::InvalidArguments(format!("no interpreter for '{language}'")))?;

        debug!(language, program = %program, "Running code block");

        let child = Command::new(program)
            .arg(flag)
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: SANDBOX_TOOL.into(),
                reason: format!("failed to start {program}: {e}"),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: SANDBOX_TOOL.into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: SANDBOX_TOOL.into(),
                reason: e.to_string(),
            })?;

        let result = ExecutionOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        };
        if !result.success() {
            warn!(language, exit_code = ?result.exit_code, "Code block failed");
        }
        Ok(result)
    }
}

/// A fenced block: (info string, body).
pub fn code_blocks(text: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    for line in text.lines() {
        let trimmed = line.trim_start();
        match current.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let language = info.split_whitespace().next().unwrap_or("").to_string();
                    current = Some((language, Vec::new()));
                }
            }
            Some((language, body)) if trimmed.starts_with("```") => {
                blocks.push((language, body.join("\n")));
            }
            Some((language, mut body)) => {
                body.push(line);
                current = Some((language, body));
            }
        }
    }
    blocks
}

#[derive(Debug)]
pub struct CodeExecutorAgent {
    pub(crate) profile: AgentProfile,
    pub(crate) engine: EngineBinding,
    pub(crate) sandbox: Arc<dyn CodeSandbox>,
}

impl CodeExecutorAgent {
    pub(crate) async fn run(&self, ctx: &ExecutionContext) -> Outcome {
        let name = self.profile.name.as_str();
        let kind = self.profile.kind;
        let mut recorder = SessionRecorder::new(name, &ctx.input);
        let messages = self.profile.prompt(ctx, ctx.input.as_str());

        let response = match self.engine.generate(name, ctx, messages, Vec::new()).await {
            Ok(response) => response,
            Err(e) => return abandon(kind, recorder, e, ""),
        };

        let mut records = Vec::new();
        let mut outputs = Vec::new();
        let mut interrupted = None;
        for (language, code) in code_blocks(&response.text) {
            let arguments = serde_json::json!({ "language": language, "code": code });
            let started_at = Utc::now();
            let result = match ctx.interruptible(self.sandbox.execute(&language, &code)).await {
                Ok(result) => result,
                Err(interruption) => {
                    records.push(ToolCallRecord::failed(
                        SANDBOX_TOOL,
                        arguments,
                        ToolError::Interrupted(interruption.to_string()),
                        started_at,
                    ));
                    interrupted = Some(interruption);
                    break;
                }
            };
            let result = match result {
                Ok(output) => {
                    outputs.push(output.render());
                    Ok(serde_json::Value::String(output.render()))
                }
                Err(error) => {
                    outputs.push(format!("ERROR: {error}"));
                    Err(ToolInvocationFailure {
                        tool: SANDBOX_TOOL.into(),
                        error,
                    })
                }
            };
            records.push(ToolCallRecord {
                tool: SANDBOX_TOOL.into(),
                arguments,
                result,
                started_at,
                finished_at: Utc::now(),
            });
        }

        let mut answer = response.text.trim().to_string();
        if !outputs.is_empty() {
            answer.push_str("\n\nExecution output:\n```\n");
            answer.push_str(&outputs.join("\n"));
            answer.push_str("\n```");
        }

        let (iteration_status, status) = match interrupted {
            Some(i) => (IterationStatus::Incomplete, OutcomeStatus::Incomplete(i.into())),
            None => (IterationStatus::Solved, OutcomeStatus::Solved),
        };
        let record = recorder.record(response.text, records, iteration_status);
        publish_iteration(ctx, name, record);
        Outcome::from_session(kind, recorder.finish(status, answer))
    }
}
