//! Pipeline builder: validation, tool resolution and agent assembly.
//!
//! `build` turns one [`PipelineSpec`] into a runnable [`Pipeline`] or a
//! [`PipelineBuildError`]. `build_all` builds a set of specs so that one
//! broken pipeline never takes down its siblings.

use ltm_config::{AgentKind, DEFAULT_MODEL, PipelineSpec};
use ltm_core::engine::ReasoningEngine;
use ltm_core::error::PipelineBuildError;
use ltm_core::event::EventBus;
use ltm_tools::{ToolCatalog, ToolRegistry};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agents::{Agent, CodeSandbox, ProcessSandbox, TerminationPredicate};
use crate::context::ExecutionContext;
use crate::marker::CompletionPolicy;
use crate::outcome::Outcome;
use crate::registry::{AgentRegistry, BuildEnv};

pub struct PipelineBuilder {
    engine: Arc<dyn ReasoningEngine>,
    catalog: ToolCatalog,
    sandbox: Arc<dyn CodeSandbox>,
    predicate: Option<Arc<dyn TerminationPredicate>>,
    default_model: String,
}

impl PipelineBuilder {
    pub fn new(engine: Arc<dyn ReasoningEngine>, catalog: ToolCatalog) -> Self {
        Self {
            engine,
            catalog,
            sandbox: Arc::new(ProcessSandbox::default()),
            predicate: None,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn CodeSandbox>) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Decide loop termination with `predicate` instead of the completion policy.
    pub fn with_termination_predicate(mut self, predicate: Arc<dyn TerminationPredicate>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Model used by agents that do not name one.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn build(&self, spec: &PipelineSpec) -> Result<Pipeline, PipelineBuildError> {
        validate(spec)?;

        let mut tools = ToolRegistry::with_defaults(&self.catalog);
        for declaration in &spec.tools {
            tools.resolve(&declaration.name, &declaration.locator, &self.catalog)?;
        }

        let policy = CompletionPolicy::from_config(spec.completion.as_ref()).map_err(|e| {
            PipelineBuildError::Invalid {
                agent: spec.name.clone(),
                reason: format!("invalid completion marker: {e}"),
            }
        })?;

        let env = BuildEnv {
            engine: Arc::clone(&self.engine),
            sandbox: Arc::clone(&self.sandbox),
            policy: Arc::new(policy),
            predicate: self.predicate.clone(),
            default_model: self.default_model.clone(),
        };
        let mut registry = AgentRegistry::new(spec.agents.iter().cloned(), tools, env);
        registry.check_acyclic()?;
        let entry = registry.get(&spec.entry)?;

        info!(
            pipeline = %spec.name,
            entry = %spec.entry,
            agents = registry.cached_names().len(),
            "Pipeline built"
        );
        Ok(Pipeline {
            name: spec.name.clone(),
            entry,
        })
    }

    /// Build every spec; failures stay with the pipeline that caused them.
    pub fn build_all(&self, specs: &[PipelineSpec]) -> Vec<(String, Result<Pipeline, PipelineBuildError>)> {
        specs
            .iter()
            .map(|spec| {
                let result = self.build(spec);
                if let Err(e) = &result {
                    warn!(pipeline = %spec.name, error = %e, "Pipeline failed to build");
                }
                (spec.name.clone(), result)
            })
            .collect()
    }
}

/// Structural checks that need no construction.
fn validate(spec: &PipelineSpec) -> Result<(), PipelineBuildError> {
    let mut names = BTreeSet::new();
    let all_names = spec
        .agents
        .iter()
        .map(|a| a.name.as_str())
        .chain(spec.tools.iter().map(|t| t.name.as_str()));
    for name in all_names {
        if !names.insert(name) {
            return Err(PipelineBuildError::DuplicateName {
                pipeline: spec.name.clone(),
                name: name.to_string(),
            });
        }
    }

    if spec.agent(&spec.entry).is_none() {
        return Err(PipelineBuildError::MissingEntry {
            pipeline: spec.name.clone(),
            entry: spec.entry.clone(),
        });
    }

    for agent in &spec.agents {
        let name = agent.name.clone();

        if agent.kind.is_bounded() && agent.max_iterations == 0 {
            return Err(PipelineBuildError::InvalidMaxIterations {
                agent: name,
                value: agent.max_iterations,
            });
        }
        if matches!(agent.kind, AgentKind::Thinking | AgentKind::Simple)
            && agent.max_tools_per_step == 0
        {
            return Err(PipelineBuildError::InvalidMaxToolsPerStep {
                agent: name,
                value: agent.max_tools_per_step,
            });
        }
        if agent.kind.is_composite() && agent.sub_agents.is_empty() {
            return Err(PipelineBuildError::MissingSubAgents {
                agent: name,
                kind: agent.kind.to_string(),
            });
        }
        if agent.kind == AgentKind::Thinking && agent.sub_agents.is_empty() && agent.tools.is_empty() {
            return Err(PipelineBuildError::Invalid {
                agent: name,
                reason: "a thinking agent needs at least one executor or tool".into(),
            });
        }
        if agent.kind == AgentKind::Dispatcher {
            if agent.routes.is_empty() {
                return Err(PipelineBuildError::NoRoutes { agent: name });
            }
            if let Some(default) = &agent.default_route
                && !agent.routes.contains(default)
            {
                return Err(PipelineBuildError::UnknownDefaultRoute {
                    agent: name,
                    route: default.clone(),
                });
            }
        }
        if let Some(reference) = agent.dependencies().find(|r| spec.agent(r).is_none()) {
            return Err(PipelineBuildError::UnknownAgent {
                agent: name,
                reference: reference.to_string(),
            });
        }
    }
    Ok(())
}

/// Per-run controls.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cancel: CancellationToken,
    pub timeout: Option<Duration>,
    /// Journal to publish into; a fresh one is used when absent
    pub events: Option<Arc<EventBus>>,
}

/// A built pipeline: an entry agent and everything it reaches.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    entry: Arc<Agent>,
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &Arc<Agent> {
        &self.entry
    }

    pub async fn run(&self, query: &str) -> Outcome {
        self.run_with(query, RunOptions::default()).await
    }

    pub async fn run_with(&self, query: &str, options: RunOptions) -> Outcome {
        let mut ctx = ExecutionContext::new(query)
            .with_cancellation(options.cancel)
            .with_events(options.events.unwrap_or_default());
        if let Some(timeout) = options.timeout {
            ctx = ctx.with_deadline(tokio::time::Instant::now() + timeout);
        }
        info!(pipeline = %self.name, entry = %self.entry.name(), "Running pipeline");
        self.entry.execute(&ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedEngine;
    use ltm_config::AgentSpec;
    use ltm_core::error::{CyclicDependencyError, ToolResolutionError};

    fn builder() -> PipelineBuilder {
        PipelineBuilder::new(
            Arc::new(ScriptedEngine::single_text("hello")),
            ToolCatalog::builtin(),
        )
    }

    fn simple(name: &str) -> AgentSpec {
        AgentSpec::new(name, AgentKind::Simple)
    }

    #[tokio::test]
    async fn builds_and_runs_a_simple_pipeline() {
        let spec = PipelineSpec::new("greeter", vec![simple("greeter").with_tools(["calculator"])]);
        let pipeline = builder().build(&spec).unwrap();
        assert_eq!(pipeline.name(), "greeter");
        assert_eq!(pipeline.entry().tool_names(), vec!["calculator"]);

        let outcome = pipeline.run("hi").await;
        assert!(outcome.is_solved());
        assert_eq!(outcome.answer, "hello");
    }

    #[test]
    fn unresolvable_tool_aborts_only_its_pipeline() {
        let broken = PipelineSpec::new("broken", vec![simple("broken").with_tools(["weather"])])
            .with_tool("weather", "nonexistent.module:get_weather");
        let healthy = PipelineSpec::new(
            "healthy",
            vec![simple("healthy").with_tools(["fib"])],
        )
        .with_tool("fib", "external_tools.tools:calculate_fibonacci");

        let results = builder().build_all(&[broken, healthy]);
        assert!(matches!(
            results[0].1,
            Err(PipelineBuildError::ToolResolution(ToolResolutionError::ModuleNotFound { .. }))
        ));
        assert!(results[1].1.is_ok());
    }

    #[test]
    fn cycles_fail_the_build() {
        let spec = PipelineSpec::new(
            "a",
            vec![
                AgentSpec::new("a", AgentKind::Sequential).with_sub_agents(["b"]),
                AgentSpec::new("b", AgentKind::Sequential).with_sub_agents(["a"]),
            ],
        );
        let err = builder().build(&spec).unwrap_err();
        assert!(matches!(err, PipelineBuildError::Cycle(CyclicDependencyError { .. })));
    }

    #[test]
    fn structural_errors_are_specific() {
        let b = builder();

        let dup = PipelineSpec::new("p", vec![simple("p").with_tools(["p"])]).with_tool("p", "builtin:calculator");
        assert!(matches!(b.build(&dup), Err(PipelineBuildError::DuplicateName { .. })));

        let zero = PipelineSpec::new(
            "p",
            vec![AgentSpec::new("p", AgentKind::Thinking).with_tools(["calculator"]).with_max_iterations(0)],
        );
        assert!(matches!(
            b.build(&zero),
            Err(PipelineBuildError::InvalidMaxIterations { value: 0, .. })
        ));

        let no_tool_budget = PipelineSpec::new(
            "p",
            vec![AgentSpec::new("p", AgentKind::Thinking).with_tools(["calculator"]).with_max_tools_per_step(0)],
        );
        assert!(matches!(
            b.build(&no_tool_budget),
            Err(PipelineBuildError::InvalidMaxToolsPerStep { value: 0, .. })
        ));

        let no_routes = PipelineSpec::new("p", vec![AgentSpec::new("p", AgentKind::Dispatcher)]);
        assert!(matches!(b.build(&no_routes), Err(PipelineBuildError::NoRoutes { .. })));

        let bad_default = PipelineSpec::new(
            "p",
            vec![
                AgentSpec::new("p", AgentKind::Dispatcher).with_routes(["x"], Some("y")),
                simple("x"),
            ],
        );
        assert!(matches!(
            b.build(&bad_default),
            Err(PipelineBuildError::UnknownDefaultRoute { .. })
        ));

        let empty_seq = PipelineSpec::new("p", vec![AgentSpec::new("p", AgentKind::Parallel)]);
        assert!(matches!(
            b.build(&empty_seq),
            Err(PipelineBuildError::MissingSubAgents { .. })
        ));

        let lonely = PipelineSpec::new("p", vec![AgentSpec::new("p", AgentKind::Thinking)]);
        assert!(matches!(b.build(&lonely), Err(PipelineBuildError::Invalid { .. })));

        let ghost = PipelineSpec::new(
            "p",
            vec![AgentSpec::new("p", AgentKind::Sequential).with_sub_agents(["ghost"])],
        );
        assert!(matches!(b.build(&ghost), Err(PipelineBuildError::UnknownAgent { .. })));

        let tool = PipelineSpec::new("p", vec![simple("p").with_tools(["undeclared"])]);
        assert!(matches!(b.build(&tool), Err(PipelineBuildError::UnknownTool { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_finalizes_as_deadline_exceeded() {
        let engine = ScriptedEngine::single_text("slow").with_latency(Duration::from_secs(60));
        let pipeline = PipelineBuilder::new(Arc::new(engine), ToolCatalog::builtin())
            .build(&PipelineSpec::new("p", vec![simple("p")]))
            .unwrap();

        let outcome = pipeline
            .run_with(
                "q",
                RunOptions {
                    timeout: Some(Duration::from_secs(1)),
                    ..RunOptions::default()
                },
            )
            .await;
        assert_eq!(
            outcome.status,
            crate::outcome::OutcomeStatus::Incomplete(
                crate::outcome::IncompleteReason::DeadlineExceeded
            )
        );
    }
}
