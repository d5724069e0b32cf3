//! Pipeline configuration loading, discovery, and flattening for LTM.
//!
//! Pipeline files are YAML or TOML documents with `defaults`,
//! `external_tools`, `agents` and `pipelines` sections. A file is parsed into
//! a [`PipelineFile`], validated for name uniqueness, and each pipeline is
//! flattened into a [`PipelineSpec`] before it reaches the builder.

pub mod discovery;
pub mod file;
pub mod settings;
pub mod spec;

use std::path::PathBuf;

pub use discovery::{LoadedConfig, discover_configs, load_all_configs, load_config, resolve_pipeline};
pub use file::{
    AgentClass, AgentConfig, AgentRef, CompletionConfig, DEFAULT_MAX_ITERATIONS,
    DEFAULT_MAX_TOOLS_PER_STEP, DEFAULT_MODEL, Defaults, MarkerRuleConfig, ModelConfig,
    PipelineFile, RetryOptions,
};
pub use settings::EngineSettings;
pub use spec::{AgentKind, AgentSpec, ModelSettings, PipelineSpec, ToolDeclaration};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config path not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read config file at {}: {reason}", .path.display())]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {}: {reason}", .path.display())]
    ParseError { path: PathBuf, reason: String },

    #[error("Config file '{label}' not found. Available: {available}")]
    FileNotFound { label: String, available: String },

    #[error("Pipeline '{name}' not found. Available: {available}")]
    PipelineNotFound { name: String, available: String },

    #[error("Ambiguous pipeline name '{name}'. Use file::name format. Found in: {}", .files.join(", "))]
    Ambiguous { name: String, files: Vec<String> },

    #[error("Duplicate name '{name}': tools, agents and pipelines share one namespace per file")]
    DuplicateName { name: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
