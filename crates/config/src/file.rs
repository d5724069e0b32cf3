//! The on-disk pipeline file model.
//!
//! A pipeline file has four sections:
//!
//! ```yaml
//! defaults:
//!   model: { name: gemini-2.5-flash-lite }
//!   max_iterations: 5
//! external_tools:
//!   calculate_fibonacci: "external_tools.tools:calculate_fibonacci"
//! agents:
//!   fib_agent:
//!     instruction: "Compute fibonacci numbers."
//!     tools: [calculate_fibonacci]
//! pipelines:
//!   planning_full:
//!     class: ThinkingAgent
//!     executor_agents: [fib_agent]
//! ```
//!
//! Pipelines are agent definitions too; `agents` holds the reusable pieces
//! they reference by name.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::ConfigError;

/// Default bound for Loop and Thinking agents when none is configured.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Default cap on tool calls a Thinking agent may run in one iteration.
pub const DEFAULT_MAX_TOOLS_PER_STEP: usize = 5;

/// Default model when neither the agent nor the file defaults name one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// A parsed pipeline file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineFile {
    #[serde(default)]
    pub defaults: Defaults,

    /// Tool name → `module:symbol` locator
    #[serde(default)]
    pub external_tools: BTreeMap<String, String>,

    /// Reusable agent definitions
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,

    /// Runnable entry points
    #[serde(default)]
    pub pipelines: BTreeMap<String, AgentConfig>,

    /// Where this file was loaded from
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// File-wide defaults merged under every agent's settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tools_per_step: Option<usize>,

    /// Completion marker grammar; built-in markers are used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionConfig>,
}

/// Model selection and call options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Absent means the engine is called exactly once per request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_options: Option<RetryOptions>,
}

impl ModelConfig {
    /// Field-wise merge: values set on `self` win over `base`.
    pub fn merged_over(&self, base: &ModelConfig) -> ModelConfig {
        ModelConfig {
            name: self.name.clone().or_else(|| base.name.clone()),
            temperature: self.temperature.or(base.temperature),
            max_tokens: self.max_tokens.or(base.max_tokens),
            retry_options: self
                .retry_options
                .clone()
                .or_else(|| base.retry_options.clone()),
        }
    }
}

/// Retry behavior for engine calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryOptions {
    /// Total attempts, including the first call
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Seconds before the first retry
    #[serde(default = "default_initial_delay")]
    pub initial_delay: f64,

    /// Backoff multiplier between retries
    #[serde(default = "default_exp_base")]
    pub exp_base: f64,

    /// HTTP statuses that are worth retrying
    #[serde(default = "default_retry_statuses")]
    pub http_status_codes: Vec<u16>,
}

fn default_attempts() -> u32 {
    5
}
fn default_initial_delay() -> f64 {
    1.0
}
fn default_exp_base() -> f64 {
    7.0
}
fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 503, 504]
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_delay: default_initial_delay(),
            exp_base: default_exp_base(),
            http_status_codes: default_retry_statuses(),
        }
    }
}

/// Completion marker grammar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Any matching rule marks the output as fully solved
    #[serde(default)]
    pub solved: Vec<MarkerRuleConfig>,

    /// Any matching rule marks the problem as unsolvable
    #[serde(default)]
    pub unsolvable: Vec<MarkerRuleConfig>,

    /// Text preceding this delimiter is the final answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_delimiter: Option<String>,
}

/// One marker rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkerRuleConfig {
    /// A regular expression
    Pattern { regex: String },
    /// Phrases that must all appear (case-insensitive)
    AllOf(Vec<String>),
    /// A single phrase (case-insensitive)
    Phrase(String),
}

/// The `class` of an agent definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentClass {
    #[default]
    Agent,
    SequentialAgent,
    ParallelAgent,
    LoopAgent,
    #[serde(alias = "PlanningAgent")]
    ThinkingAgent,
    #[serde(alias = "RouterAgent")]
    DispatcherAgent,
    CodeExecutorAgent,
}

impl std::fmt::Display for AgentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Agent => "Agent",
            Self::SequentialAgent => "SequentialAgent",
            Self::ParallelAgent => "ParallelAgent",
            Self::LoopAgent => "LoopAgent",
            Self::ThinkingAgent => "ThinkingAgent",
            Self::DispatcherAgent => "DispatcherAgent",
            Self::CodeExecutorAgent => "CodeExecutorAgent",
        };
        f.write_str(name)
    }
}

/// One agent definition, either in `agents`, in `pipelines`, or inline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Only meaningful for inline definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub class: AgentClass,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,

    /// Shown to other agents when this agent is exposed as a tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tool names; a name may also refer to another agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Sub-agents of composite agents
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentRef>,

    /// Executors of a ThinkingAgent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub executor_agents: Vec<AgentRef>,

    /// Candidate downstream pipelines of a DispatcherAgent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_route: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tools_per_step: Option<usize>,

    #[serde(default)]
    pub model: ModelConfig,

    /// Store this agent's answer in shared pipeline state under this key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    /// `BuiltInCodeExecutor` turns a plain Agent into a code executor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_executor: Option<String>,
}

/// A sub-agent reference: a name or an inline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentRef {
    Name(String),
    Inline(Box<AgentConfig>),
}

impl PipelineFile {
    /// Parse YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let file: Self = serde_yaml::from_str(text).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<yaml>"),
            reason: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: Self = toml::from_str(text).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<toml>"),
            reason: e.to_string(),
        })?;
        file.validate()?;
        Ok(file)
    }

    /// File-level checks: one namespace for every declared name, sane retries.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        let names = self
            .external_tools
            .keys()
            .chain(self.agents.keys())
            .chain(self.pipelines.keys());
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateName { name: name.clone() });
            }
        }

        let retries = std::iter::once(&self.defaults.model)
            .chain(self.agents.values().map(|a| &a.model))
            .chain(self.pipelines.values().map(|a| &a.model))
            .filter_map(|m| m.retry_options.as_ref());
        for retry in retries {
            if retry.exp_base < 1.0 || retry.initial_delay < 0.0 {
                return Err(ConfigError::ValidationError(
                    "retry_options needs exp_base >= 1 and initial_delay >= 0".into(),
                ));
            }
        }
        Ok(())
    }

    /// Whether `name` is an agent or pipeline defined in this file.
    pub fn defines_agent(&self, name: &str) -> bool {
        self.agents.contains_key(name) || self.pipelines.contains_key(name)
    }

    /// Pipeline names in sorted order.
    pub fn pipeline_names(&self) -> Vec<&str> {
        self.pipelines.keys().map(String::as_str).collect()
    }
}
