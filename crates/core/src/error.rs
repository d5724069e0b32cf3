//! Error types for the LTM domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; build-time errors abort the
//! owning pipeline only, run-time engine errors abort the current session,
//! and tool errors are captured as data by the tool proxy.

use thiserror::Error;

// --- Run-time errors ---

/// Failure of a remote reasoning engine call.
///
/// Surfaced to the caller of the current iteration; never retried unless a
/// retry policy is configured explicitly.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReasoningEngineError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by engine, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ReasoningEngineError {
    /// HTTP status associated with this error, if there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { status_code, .. } => Some(*status_code),
            Self::RateLimited { .. } => Some(429),
            Self::AuthenticationFailed(_) => Some(401),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool call limit reached: at most {limit} calls per step")]
    LimitExceeded { limit: usize },

    #[error("Tool call interrupted: {0}")]
    Interrupted(String),
}

// --- Build-time errors ---

/// A tool reference could not be resolved to a registered callable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolResolutionError {
    #[error("Invalid locator '{locator}' for tool '{tool}': expected 'module:symbol'")]
    InvalidLocator { tool: String, locator: String },

    #[error("Could not resolve module '{module}' for tool '{tool}'")]
    ModuleNotFound { tool: String, module: String },

    #[error("Symbol '{symbol}' not found in module '{module}' for tool '{tool}'")]
    SymbolNotFound {
        tool: String,
        module: String,
        symbol: String,
    },
}

impl ToolResolutionError {
    /// The tool name whose resolution failed.
    pub fn tool(&self) -> &str {
        match self {
            Self::InvalidLocator { tool, .. }
            | Self::ModuleNotFound { tool, .. }
            | Self::SymbolNotFound { tool, .. } => tool,
        }
    }
}

/// The agent dependency graph contains a cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cyclic agent dependency: {}", .cycle.join(" -> "))]
pub struct CyclicDependencyError {
    /// The agents forming the cycle; the first name is repeated at the end.
    pub cycle: Vec<String>,
}

/// Building a pipeline failed. Aborts that pipeline only.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineBuildError {
    #[error(transparent)]
    ToolResolution(#[from] ToolResolutionError),

    #[error(transparent)]
    Cycle(#[from] CyclicDependencyError),

    #[error("Duplicate name '{name}' in pipeline '{pipeline}'")]
    DuplicateName { pipeline: String, name: String },

    #[error("Entry agent '{entry}' of pipeline '{pipeline}' is not defined")]
    MissingEntry { pipeline: String, entry: String },

    #[error("Agent '{agent}' references unknown agent '{reference}'")]
    UnknownAgent { agent: String, reference: String },

    #[error("Agent '{agent}' references unknown tool '{tool}'")]
    UnknownTool { agent: String, tool: String },

    #[error("Agent '{agent}' has max_iterations = {value}; it must be at least 1")]
    InvalidMaxIterations { agent: String, value: u32 },

    #[error("Agent '{agent}' has max_tools_per_step = {value}; it must be at least 1")]
    InvalidMaxToolsPerStep { agent: String, value: usize },

    #[error("Dispatcher '{agent}' declares no candidate routes")]
    NoRoutes { agent: String },

    #[error("Dispatcher '{agent}' has default route '{route}' which is not one of its routes")]
    UnknownDefaultRoute { agent: String, route: String },

    #[error("Agent '{agent}' ({kind}) requires at least one sub-agent")]
    MissingSubAgents { agent: String, kind: String },

    #[error("Agent '{agent}' is invalid: {reason}")]
    Invalid { agent: String, reason: String },
}
