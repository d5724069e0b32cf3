//! Agent registry: memoized, dependency-ordered agent construction.
//!
//! One registry exists per build session. `get` builds an agent after all of
//! its sub-agents, caches it, and hands out the same `Arc` on every later
//! lookup. The reference graph is checked for cycles before anything is
//! built, and a failed top-level `get` leaves the cache as it found it.

use ltm_config::{AgentKind, AgentSpec};
use ltm_core::engine::ReasoningEngine;
use ltm_core::error::{CyclicDependencyError, PipelineBuildError};
use ltm_providers::RetryingEngine;
use ltm_tools::ToolRegistry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::agents::{
    Agent, AgentProfile, CodeExecutorAgent, CodeSandbox, DispatcherAgent, EngineBinding,
    LoopAgent, ParallelAgent, PolicyPredicate, SequentialAgent, SimpleAgent, TerminationPredicate,
    ThinkingAgent, ToolBinding, Toolbox,
};
use crate::marker::CompletionPolicy;

/// Shared collaborators every agent of one pipeline is built with.
#[derive(Clone)]
pub struct BuildEnv {
    pub engine: Arc<dyn ReasoningEngine>,
    pub sandbox: Arc<dyn CodeSandbox>,
    pub policy: Arc<CompletionPolicy>,
    /// Overrides the completion-policy predicate of loop agents
    pub predicate: Option<Arc<dyn TerminationPredicate>>,
    pub default_model: String,
}

pub struct AgentRegistry {
    specs: BTreeMap<String, AgentSpec>,
    tools: ToolRegistry,
    env: BuildEnv,
    cache: BTreeMap<String, Arc<Agent>>,
    /// Agents whose construction is in progress, outermost first
    building: Vec<String>,
}

impl AgentRegistry {
    pub fn new(specs: impl IntoIterator<Item = AgentSpec>, tools: ToolRegistry, env: BuildEnv) -> Self {
        Self {
            specs: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
            tools,
            env,
            cache: BTreeMap::new(),
            building: Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// The cached instance, if `name` has been built.
    pub fn cached(&self, name: &str) -> Option<Arc<Agent>> {
        self.cache.get(name).cloned()
    }

    pub fn cached_names(&self) -> Vec<&str> {
        self.cache.keys().map(String::as_str).collect()
    }

    /// Every agent `spec` refers to: sub-agents, routes, and tools that name agents.
    fn edges<'a>(&'a self, spec: &'a AgentSpec) -> impl Iterator<Item = &'a str> + 'a {
        spec.dependencies().chain(
            spec.tools
                .iter()
                .map(String::as_str)
                .filter(|tool| self.specs.contains_key(*tool)),
        )
    }

    /// Check the whole reference graph for cycles.
    pub fn check_acyclic(&self) -> Result<(), CyclicDependencyError> {
        let mut done = BTreeSet::new();
        for name in self.specs.keys() {
            self.visit(name, &mut Vec::new(), &mut done)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        stack: &mut Vec<&'a str>,
        done: &mut BTreeSet<&'a str>,
    ) -> Result<(), CyclicDependencyError> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|n| *n == name) {
            let mut cycle: Vec<String> = stack[pos..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(CyclicDependencyError { cycle });
        }
        let Some(spec) = self.specs.get(name) else {
            // Unknown references are reported when they are built.
            return Ok(());
        };
        stack.push(name);
        for dep in self.edges(spec) {
            self.visit(dep, stack, done)?;
        }
        stack.pop();
        done.insert(name);
        Ok(())
    }

    /// Build (or fetch) the agent called `name`.
    pub fn get(&mut self, name: &str) -> Result<Arc<Agent>, PipelineBuildError> {
        if let Some(agent) = self.cached(name) {
            return Ok(agent);
        }
        self.visit(name, &mut Vec::new(), &mut BTreeSet::new())?;

        let before: BTreeSet<String> = self.cache.keys().cloned().collect();
        match self.resolve(name, None) {
            Ok(agent) => Ok(agent),
            Err(e) => {
                self.cache.retain(|key, _| before.contains(key));
                self.building.clear();
                debug!(agent = name, error = %e, "Build failed, cache rolled back");
                Err(e)
            }
        }
    }

    fn resolve(&mut self, name: &str, parent: Option<&str>) -> Result<Arc<Agent>, PipelineBuildError> {
        if let Some(agent) = self.cached(name) {
            return Ok(agent);
        }
        if let Some(pos) = self.building.iter().position(|n| n == name) {
            let mut cycle = self.building[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(CyclicDependencyError { cycle }.into());
        }
        let spec = self
            .specs
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineBuildError::UnknownAgent {
                agent: parent.unwrap_or(name).to_string(),
                reference: name.to_string(),
            })?;

        self.building.push(name.to_string());
        let built = self.construct(&spec);
        self.building.pop();

        let agent = Arc::new(built?);
        self.cache.insert(name.to_string(), Arc::clone(&agent));
        debug!(agent = name, kind = %spec.kind, "Built agent");
        Ok(agent)
    }

    fn children(&mut self, spec: &AgentSpec, names: &[String]) -> Result<Vec<Arc<Agent>>, PipelineBuildError> {
        names
            .iter()
            .map(|child| self.resolve(child, Some(&spec.name)))
            .collect()
    }

    fn toolbox(&mut self, spec: &AgentSpec) -> Result<Toolbox, PipelineBuildError> {
        let mut toolbox = Toolbox::new();
        for tool in &spec.tools {
            let binding = if self.specs.contains_key(tool) {
                ToolBinding::Agent(self.resolve(tool, Some(&spec.name))?)
            } else {
                let proxy = self
                    .tools
                    .get(tool)
                    .ok_or_else(|| PipelineBuildError::UnknownTool {
                        agent: spec.name.clone(),
                        tool: tool.clone(),
                    })?;
                ToolBinding::Tool(proxy)
            };
            toolbox.push(tool.clone(), binding);
        }
        Ok(toolbox)
    }

    fn engine_binding(&self, spec: &AgentSpec) -> EngineBinding {
        EngineBinding {
            engine: RetryingEngine::wrap(Arc::clone(&self.env.engine), spec.model.retry.as_ref()),
            model: spec
                .model
                .name
                .clone()
                .unwrap_or_else(|| self.env.default_model.clone()),
            temperature: spec.model.temperature,
            max_tokens: spec.model.max_tokens,
        }
    }

    fn construct(&mut self, spec: &AgentSpec) -> Result<Agent, PipelineBuildError> {
        let description = spec.description.clone().unwrap_or_else(|| {
            spec.instruction
                .lines()
                .find(|line| !line.trim().is_empty())
                .unwrap_or_default()
                .trim()
                .to_string()
        });
        let mut profile = AgentProfile {
            name: spec.name.clone(),
            kind: spec.kind,
            instruction: spec.instruction.clone(),
            description,
            output_key: spec.output_key.clone(),
        };

        let agent = match spec.kind {
            AgentKind::Simple => Agent::Simple(SimpleAgent {
                toolbox: self.toolbox(spec)?,
                engine: self.engine_binding(spec),
                max_tools_per_step: spec.max_tools_per_step,
                profile,
            }),
            AgentKind::Sequential => Agent::Sequential(SequentialAgent {
                steps: self.children(spec, &spec.sub_agents)?,
                profile,
            }),
            AgentKind::Parallel => Agent::Parallel(ParallelAgent {
                branches: self.children(spec, &spec.sub_agents)?,
                profile,
            }),
            AgentKind::Loop => Agent::Loop(LoopAgent {
                body: self.children(spec, &spec.sub_agents)?,
                max_iterations: spec.max_iterations,
                predicate: self.env.predicate.clone().unwrap_or_else(|| {
                    Arc::new(PolicyPredicate(Arc::clone(&self.env.policy)))
                }),
                policy: Arc::clone(&self.env.policy),
                profile,
            }),
            AgentKind::CodeExecutor => Agent::CodeExecutor(CodeExecutorAgent {
                engine: self.engine_binding(spec),
                sandbox: Arc::clone(&self.env.sandbox),
                profile,
            }),
            AgentKind::Thinking => {
                let mut toolbox = self.toolbox(spec)?;
                for executor in &spec.sub_agents {
                    if toolbox.get(executor).is_none() {
                        let agent = self.resolve(executor, Some(&spec.name))?;
                        toolbox.push(executor.clone(), ToolBinding::Agent(agent));
                    }
                }
                if profile.instruction.trim().is_empty() {
                    profile.instruction = ThinkingAgent::default_instruction(
                        &toolbox,
                        spec.max_iterations,
                        spec.max_tools_per_step,
                        self.env.policy.answer_delimiter(),
                    );
                }
                Agent::Thinking(ThinkingAgent {
                    engine: self.engine_binding(spec),
                    toolbox,
                    max_iterations: spec.max_iterations,
                    max_tools_per_step: spec.max_tools_per_step,
                    policy: Arc::clone(&self.env.policy),
                    profile,
                })
            }
            AgentKind::Dispatcher => {
                let mut routes = Vec::with_capacity(spec.routes.len());
                for route in &spec.routes {
                    routes.push((route.clone(), self.resolve(route, Some(&spec.name))?));
                }
                Agent::Dispatcher(DispatcherAgent {
                    engine: self.engine_binding(spec),
                    routes,
                    default_route: spec.default_route.clone(),
                    profile,
                })
            }
        };
        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ProcessSandbox;
    use crate::test_helpers::ScriptedEngine;

    fn env() -> BuildEnv {
        BuildEnv {
            engine: Arc::new(ScriptedEngine::single_text("ok")),
            sandbox: Arc::new(ProcessSandbox::default()),
            policy: Arc::new(CompletionPolicy::default()),
            predicate: None,
            default_model: "mock-model".into(),
        }
    }

    fn simple(name: &str) -> AgentSpec {
        AgentSpec::new(name, AgentKind::Simple)
    }

    fn sequence(name: &str, steps: &[&str]) -> AgentSpec {
        AgentSpec::new(name, AgentKind::Sequential).with_sub_agents(steps.iter().copied())
    }

    #[test]
    fn repeated_lookups_share_one_instance() {
        let mut registry = AgentRegistry::new(
            vec![
                sequence("left", &["shared"]),
                sequence("right", &["shared"]),
                simple("shared"),
            ],
            ToolRegistry::new(),
            env(),
        );

        let left = registry.get("left").unwrap();
        let right = registry.get("right").unwrap();
        let shared = registry.get("shared").unwrap();

        assert!(Arc::ptr_eq(left.sub_agents()[0], &shared));
        assert!(Arc::ptr_eq(right.sub_agents()[0], &shared));
        assert!(Arc::ptr_eq(&registry.get("left").unwrap(), &left));
    }

    #[test]
    fn cycles_are_reported_with_their_path() {
        let mut registry = AgentRegistry::new(
            vec![
                sequence("a", &["b"]),
                sequence("b", &["c"]),
                sequence("c", &["a"]),
            ],
            ToolRegistry::new(),
            env(),
        );

        let err = registry.check_acyclic().unwrap_err();
        assert_eq!(err.cycle, vec!["a", "b", "c", "a"]);

        let err = registry.get("b").unwrap_err();
        assert!(matches!(
            err,
            PipelineBuildError::Cycle(CyclicDependencyError { ref cycle }) if cycle == &["b", "c", "a", "b"]
        ));
        assert!(registry.cached_names().is_empty());
    }

    #[test]
    fn agent_used_as_tool_counts_as_an_edge() {
        let registry = AgentRegistry::new(
            vec![
                simple("a").with_tools(["b"]),
                simple("b").with_tools(["a"]),
            ],
            ToolRegistry::new(),
            env(),
        );
        assert!(registry.check_acyclic().is_err());
    }

    #[test]
    fn failed_build_rolls_back_the_cache() {
        let mut registry = AgentRegistry::new(
            vec![
                sequence("root", &["good", "bad"]),
                simple("good"),
                simple("bad").with_tools(["missing_tool"]),
            ],
            ToolRegistry::new(),
            env(),
        );

        let err = registry.get("root").unwrap_err();
        assert_eq!(
            err,
            PipelineBuildError::UnknownTool {
                agent: "bad".into(),
                tool: "missing_tool".into()
            }
        );
        assert!(registry.cached("good").is_none());
        assert!(registry.cached_names().is_empty());
    }

    #[test]
    fn unknown_sub_agent_names_its_parent() {
        let mut registry =
            AgentRegistry::new(vec![sequence("root", &["ghost"])], ToolRegistry::new(), env());
        assert_eq!(
            registry.get("root").unwrap_err(),
            PipelineBuildError::UnknownAgent {
                agent: "root".into(),
                reference: "ghost".into()
            }
        );
    }

    #[test]
    fn thinking_executors_become_tools() {
        let mut registry = AgentRegistry::new(
            vec![
                AgentSpec::new("planner", AgentKind::Thinking).with_sub_agents(["worker"]),
                simple("worker").with_description("Does the work"),
            ],
            ToolRegistry::new(),
            env(),
        );
        let planner = registry.get("planner").unwrap();
        let Agent::Thinking(thinking) = planner.as_ref() else {
            panic!("expected a thinking agent");
        };
        assert_eq!(thinking.toolbox.names(), vec!["worker"]);
        assert!(thinking.profile.instruction.contains("- worker: Does the work"));
    }
}
