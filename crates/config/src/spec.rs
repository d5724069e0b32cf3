//! The validated-shape model handed to the pipeline builder.
//!
//! [`PipelineFile::pipeline_spec`] flattens one pipeline of a file into a
//! [`PipelineSpec`]: the entry agent plus every agent reachable from it,
//! with defaults merged in and inline definitions given stable names. Only
//! the external tools that reachable agents actually reference are carried,
//! so a broken tool declaration only affects the pipelines that use it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::ConfigError;
use crate::file::{
    AgentClass, AgentConfig, AgentRef, CompletionConfig, DEFAULT_MAX_ITERATIONS,
    DEFAULT_MAX_TOOLS_PER_STEP, PipelineFile, RetryOptions,
};

/// Execution strategy of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    Simple,
    Sequential,
    Parallel,
    Loop,
    CodeExecutor,
    Thinking,
    Dispatcher,
}

impl AgentKind {
    /// Map a config `class` (plus the `code_executor` switch) onto a kind.
    pub fn from_class(class: AgentClass, code_executor: Option<&str>) -> Self {
        match class {
            AgentClass::Agent if code_executor.is_some() => Self::CodeExecutor,
            AgentClass::Agent => Self::Simple,
            AgentClass::SequentialAgent => Self::Sequential,
            AgentClass::ParallelAgent => Self::Parallel,
            AgentClass::LoopAgent => Self::Loop,
            AgentClass::ThinkingAgent => Self::Thinking,
            AgentClass::DispatcherAgent => Self::Dispatcher,
            AgentClass::CodeExecutorAgent => Self::CodeExecutor,
        }
    }

    /// Whether `max_iterations` applies to this kind.
    pub fn is_bounded(self) -> bool {
        matches!(self, Self::Loop | Self::Thinking)
    }

    /// Whether this kind needs at least one sub-agent.
    pub fn is_composite(self) -> bool {
        matches!(self, Self::Sequential | Self::Parallel | Self::Loop)
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Simple => "simple",
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Loop => "loop",
            Self::CodeExecutor => "code_executor",
            Self::Thinking => "thinking",
            Self::Dispatcher => "dispatcher",
        };
        f.write_str(name)
    }
}

/// Effective model settings of one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// `None` means the runtime default model
    pub name: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub retry: Option<RetryOptions>,
}

/// One agent, fully resolved against file defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub kind: AgentKind,
    pub instruction: String,
    pub description: Option<String>,
    /// Tool names in declared order; may name agents of the same pipeline
    pub tools: Vec<String>,
    /// Sub-agents in declared order (executors for Thinking agents)
    pub sub_agents: Vec<String>,
    /// Dispatcher candidates in declared order
    pub routes: Vec<String>,
    pub default_route: Option<String>,
    pub max_iterations: u32,
    pub max_tools_per_step: usize,
    pub model: ModelSettings,
    pub output_key: Option<String>,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            instruction: String::new(),
            description: None,
            tools: Vec::new(),
            sub_agents: Vec::new(),
            routes: Vec::new(),
            default_route: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tools_per_step: DEFAULT_MAX_TOOLS_PER_STEP,
            model: ModelSettings::default(),
            output_key: None,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sub_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_agents = agents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_routes<I, S>(mut self, routes: I, default_route: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes = routes.into_iter().map(Into::into).collect();
        self.default_route = default_route.map(str::to_string);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_tools_per_step(mut self, limit: usize) -> Self {
        self.max_tools_per_step = limit;
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Every agent name this spec depends on (sub-agents, then routes).
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.sub_agents
            .iter()
            .chain(self.routes.iter())
            .map(String::as_str)
    }
}

/// An external tool the pipeline needs resolved at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    /// `module:symbol`
    pub locator: String,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
        }
    }
}

/// One runnable pipeline: an entry agent and everything reachable from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    pub entry: String,
    /// In discovery order, entry first; duplicates are left for the builder
    pub agents: Vec<AgentSpec>,
    pub tools: Vec<ToolDeclaration>,
    pub completion: Option<CompletionConfig>,
}

impl PipelineSpec {
    /// A spec whose entry is its first agent.
    pub fn new(name: impl Into<String>, agents: Vec<AgentSpec>) -> Self {
        let entry = agents.first().map(|a| a.name.clone()).unwrap_or_default();
        Self {
            name: name.into(),
            entry,
            agents,
            tools: Vec::new(),
            completion: None,
        }
    }

    pub fn with_tool(mut self, name: impl Into<String>, locator: impl Into<String>) -> Self {
        self.tools.push(ToolDeclaration::new(name, locator));
        self
    }

    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.name == name)
    }
}

impl PipelineFile {
    /// Flatten the named pipeline into a [`PipelineSpec`].
    pub fn pipeline_spec(&self, name: &str) -> Result<PipelineSpec, ConfigError> {
        let entry = self
            .pipelines
            .get(name)
            .ok_or_else(|| ConfigError::PipelineNotFound {
                name: name.to_string(),
                available: self.pipeline_names().join(", "),
            })?;

        let mut queue: VecDeque<(String, &AgentConfig)> = VecDeque::new();
        let mut queued_named: BTreeSet<String> = BTreeSet::new();
        let mut declared_tools: BTreeSet<String> = BTreeSet::new();
        let mut agents = Vec::new();
        let mut tools = Vec::new();

        queue.push_back((name.to_string(), entry));
        queued_named.insert(name.to_string());

        while let Some((agent_name, config)) = queue.pop_front() {
            let mut sub_agents = Vec::new();
            let refs = config
                .agents
                .iter()
                .enumerate()
                .map(|(i, r)| (r, format!("{agent_name}_sub_{i}")))
                .chain(
                    config
                        .executor_agents
                        .iter()
                        .enumerate()
                        .map(|(i, r)| (r, format!("{agent_name}_executor_{i}"))),
                );
            for (agent_ref, generated) in refs {
                match agent_ref {
                    AgentRef::Name(target) => {
                        self.enqueue(target, &mut queued_named, &mut queue);
                        sub_agents.push(target.clone());
                    }
                    AgentRef::Inline(inline) => {
                        let inline_name = inline.name.clone().unwrap_or(generated);
                        sub_agents.push(inline_name.clone());
                        queue.push_back((inline_name, inline.as_ref()));
                    }
                }
            }

            for route in &config.routes {
                self.enqueue(route, &mut queued_named, &mut queue);
            }

            for tool in &config.tools {
                if self.defines_agent(tool) {
                    self.enqueue(tool, &mut queued_named, &mut queue);
                } else if let Some(locator) = self.external_tools.get(tool)
                    && declared_tools.insert(tool.clone())
                {
                    tools.push(ToolDeclaration::new(tool.clone(), locator.clone()));
                }
            }

            agents.push(self.agent_spec(agent_name, config, sub_agents));
        }

        tracing::debug!(
            pipeline = name,
            agents = agents.len(),
            tools = tools.len(),
            "Flattened pipeline"
        );

        Ok(PipelineSpec {
            name: name.to_string(),
            entry: name.to_string(),
            agents,
            tools,
            completion: self.defaults.completion.clone(),
        })
    }

    /// Flatten every pipeline, keeping per-pipeline failures separate.
    pub fn pipeline_specs(&self) -> Vec<(String, Result<PipelineSpec, ConfigError>)> {
        self.pipelines
            .keys()
            .map(|name| (name.clone(), self.pipeline_spec(name)))
            .collect()
    }

    fn lookup_agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.get(name).or_else(|| self.pipelines.get(name))
    }

    /// Queue a named agent once; names not defined here are left for the builder.
    fn enqueue<'a>(
        &'a self,
        target: &str,
        seen: &mut BTreeSet<String>,
        queue: &mut VecDeque<(String, &'a AgentConfig)>,
    ) {
        if let Some(found) = self.lookup_agent(target)
            && seen.insert(target.to_string())
        {
            queue.push_back((target.to_string(), found));
        }
    }

    fn agent_spec(&self, name: String, config: &AgentConfig, sub_agents: Vec<String>) -> AgentSpec {
        let model = config.model.merged_over(&self.defaults.model);
        AgentSpec {
            name,
            kind: AgentKind::from_class(config.class, config.code_executor.as_deref()),
            instruction: config.instruction.clone().unwrap_or_default(),
            description: config.description.clone(),
            tools: config.tools.clone(),
            sub_agents,
            routes: config.routes.clone(),
            default_route: config.default_route.clone(),
            max_iterations: config
                .max_iterations
                .or(self.defaults.max_iterations)
                .unwrap_or(DEFAULT_MAX_ITERATIONS),
            max_tools_per_step: config
                .max_tools_per_step
                .or(self.defaults.max_tools_per_step)
                .unwrap_or(DEFAULT_MAX_TOOLS_PER_STEP),
            model: ModelSettings {
                name: model.name,
                temperature: model.temperature,
                max_tokens: model.max_tokens,
                retry: model.retry_options,
            },
            output_key: config.output_key.clone(),
        }
    }
}
