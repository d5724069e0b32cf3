//! The closed set of agent strategies.
//!
//! Every agent is one variant of [`Agent`] and exposes one capability:
//! `execute(ctx) -> Outcome`. Composite agents hold their sub-agents as
//! shared `Arc<Agent>` handles built by the registry.

pub mod code_executor;
pub mod dispatcher;
pub mod loop_agent;
pub mod parallel;
pub mod sequential;
pub mod simple;
pub mod thinking;
pub mod toolbox;

use chrono::Utc;
use futures::future::BoxFuture;
use ltm_config::AgentKind;
use ltm_core::engine::{EngineRequest, EngineResponse, ReasoningEngine, ToolDefinition};
use ltm_core::error::ReasoningEngineError;
use ltm_core::event::DomainEvent;
use ltm_core::message::Message;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::context::{ExecutionContext, Interruption};
use crate::outcome::{Outcome, OutcomeStatus};
use crate::session::{IterationRecord, SessionRecorder};

pub use code_executor::{CodeExecutorAgent, CodeSandbox, ExecutionOutput, ProcessSandbox};
pub use dispatcher::DispatcherAgent;
pub use loop_agent::{LoopAgent, PolicyPredicate, TerminationPredicate};
pub use parallel::ParallelAgent;
pub use sequential::SequentialAgent;
pub use simple::SimpleAgent;
pub use thinking::ThinkingAgent;
pub use toolbox::{ToolBinding, ToolRound, Toolbox};

/// Identity shared by every strategy.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub name: String,
    pub kind: AgentKind,
    pub instruction: String,
    pub description: String,
    pub output_key: Option<String>,
}

impl AgentProfile {
    /// The instruction with `{key}` placeholders filled from shared state.
    pub fn render_instruction(&self, state: &BTreeMap<String, String>) -> String {
        state.iter().fold(self.instruction.clone(), |text, (key, value)| {
            text.replace(&format!("{{{key}}}"), value)
        })
    }

    /// System (if any) and user messages for a fresh prompt.
    pub(crate) fn prompt(&self, ctx: &ExecutionContext, user: impl Into<String>) -> Vec<Message> {
        let instruction = self.render_instruction(&ctx.state);
        let mut messages = Vec::with_capacity(2);
        if !instruction.trim().is_empty() {
            messages.push(Message::system(instruction));
        }
        messages.push(Message::user(user));
        messages
    }
}

/// The engine an agent talks to, with its model settings.
#[derive(Clone)]
pub struct EngineBinding {
    pub engine: Arc<dyn ReasoningEngine>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl std::fmt::Debug for EngineBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBinding")
            .field("engine", &self.engine.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Why an engine call produced no response.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCallError {
    Engine(ReasoningEngineError),
    Interrupted(Interruption),
}

impl EngineBinding {
    /// One engine call, raced against the context's interruption signals.
    pub async fn generate(
        &self,
        agent: &str,
        ctx: &ExecutionContext,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<EngineResponse, EngineCallError> {
        let request = EngineRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        };

        let start = Instant::now();
        let result = ctx
            .interruptible(self.engine.generate(request))
            .await
            .map_err(EngineCallError::Interrupted)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        ctx.events.publish(DomainEvent::EngineCalled {
            agent: agent.to_string(),
            model: self.model.clone(),
            success: result.is_ok(),
            tokens_used: result
                .as_ref()
                .ok()
                .and_then(|r| r.usage)
                .map_or(0, |u| u.total_tokens),
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(response) => {
                debug!(
                    agent,
                    model = %self.model,
                    duration_ms,
                    tool_calls = response.tool_calls.len(),
                    "Engine responded"
                );
                Ok(response)
            }
            Err(e) => {
                warn!(agent, model = %self.model, duration_ms, error = %e, "Engine call failed");
                Err(EngineCallError::Engine(e))
            }
        }
    }
}

/// Close a session after an engine call produced nothing.
pub(crate) fn abandon(
    kind: AgentKind,
    recorder: SessionRecorder,
    error: EngineCallError,
    partial: impl Into<String>,
) -> Outcome {
    let status = match error {
        EngineCallError::Engine(e) => OutcomeStatus::Failed(e),
        EngineCallError::Interrupted(i) => OutcomeStatus::Incomplete(i.into()),
    };
    Outcome::from_session(kind, recorder.finish(status, partial))
}

pub(crate) fn publish_iteration(ctx: &ExecutionContext, agent: &str, record: &IterationRecord) {
    debug!(
        agent,
        iteration = record.sequence,
        status = %record.status,
        tool_calls = record.tool_calls.len(),
        "Iteration recorded"
    );
    ctx.events.publish(DomainEvent::IterationRecorded {
        agent: agent.to_string(),
        sequence: record.sequence,
        status: record.status.to_string(),
        timestamp: record.recorded_at,
    });
}

#[derive(Debug)]
pub enum Agent {
    Simple(SimpleAgent),
    Sequential(SequentialAgent),
    Parallel(ParallelAgent),
    Loop(LoopAgent),
    CodeExecutor(CodeExecutorAgent),
    Thinking(ThinkingAgent),
    Dispatcher(DispatcherAgent),
}

impl Agent {
    pub fn profile(&self) -> &AgentProfile {
        match self {
            Self::Simple(a) => &a.profile,
            Self::Sequential(a) => &a.profile,
            Self::Parallel(a) => &a.profile,
            Self::Loop(a) => &a.profile,
            Self::CodeExecutor(a) => &a.profile,
            Self::Thinking(a) => &a.profile,
            Self::Dispatcher(a) => &a.profile,
        }
    }

    pub fn name(&self) -> &str {
        &self.profile().name
    }

    pub fn kind(&self) -> AgentKind {
        self.profile().kind
    }

    pub fn description(&self) -> &str {
        &self.profile().description
    }

    /// Names of the tools this agent may call.
    pub fn tool_names(&self) -> Vec<&str> {
        match self {
            Self::Simple(a) => a.toolbox.names(),
            Self::Thinking(a) => a.toolbox.names(),
            _ => Vec::new(),
        }
    }

    /// Agents this one runs directly, in declared order.
    pub fn sub_agents(&self) -> Vec<&Arc<Agent>> {
        match self {
            Self::Sequential(a) => a.steps.iter().collect(),
            Self::Parallel(a) => a.branches.iter().collect(),
            Self::Loop(a) => a.body.iter().collect(),
            Self::Thinking(a) => a.toolbox.agents(),
            Self::Simple(a) => a.toolbox.agents(),
            Self::Dispatcher(a) => a.routes.iter().map(|(_, agent)| agent).collect(),
            Self::CodeExecutor(_) => Vec::new(),
        }
    }

    /// Run this agent. Never panics and never returns an error: failures are
    /// part of the outcome.
    pub fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let profile = self.profile();
            info!(agent = %profile.name, kind = %profile.kind, "Agent started");
            ctx.events.publish(DomainEvent::AgentStarted {
                agent: profile.name.clone(),
                kind: profile.kind.to_string(),
                timestamp: Utc::now(),
            });
            let start = Instant::now();

            let mut outcome = match self {
                Self::Simple(a) => a.run(ctx).await,
                Self::Sequential(a) => a.run(ctx).await,
                Self::Parallel(a) => a.run(ctx).await,
                Self::Loop(a) => a.run(ctx).await,
                Self::CodeExecutor(a) => a.run(ctx).await,
                Self::Thinking(a) => a.run(ctx).await,
                Self::Dispatcher(a) => a.run(ctx).await,
            };

            if let Some(key) = &profile.output_key
                && !outcome.is_failed()
            {
                outcome.state.insert(key.clone(), outcome.answer.clone());
            }

            ctx.events.publish(DomainEvent::AgentFinished {
                agent: profile.name.clone(),
                status: outcome.status.to_string(),
                timestamp: Utc::now(),
            });
            info!(
                agent = %profile.name,
                status = %outcome.status,
                iterations = outcome.iterations().len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Agent finished"
            );
            outcome
        })
    }
}
