//! The bounded plan → act → verify loop.
//!
//! Every iteration sends one fresh prompt restating the verbatim query, the
//! full history of earlier iterations (text, tool calls and their results or
//! errors), the unchecked requirements from the latest iteration, and where
//! the loop stands against its bound. The engine's text decides what happens
//! next:
//!
//! - a solved marker terminates the loop as Solved;
//! - an unsolvable marker terminates it as Incomplete(Unsolvable);
//! - anything else dispatches the requested tool calls and continues.
//!
//! Reaching `max_iterations` returns the last partial answer as
//! Incomplete(MaxIterations). Engine failures and interruptions close the
//! session with whatever history exists.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AgentProfile, EngineBinding, EngineCallError, Toolbox, publish_iteration};
use crate::context::ExecutionContext;
use crate::marker::{Completion, CompletionPolicy, unresolved_requirements};
use crate::outcome::{IncompleteReason, Outcome, OutcomeStatus};
use crate::session::{IterationRecord, IterationStatus, SessionRecorder};

#[derive(Debug)]
pub struct ThinkingAgent {
    pub(crate) profile: AgentProfile,
    pub(crate) engine: EngineBinding,
    /// Tools and executor agents, callable by name
    pub(crate) toolbox: Toolbox,
    pub(crate) max_iterations: u32,
    pub(crate) max_tools_per_step: usize,
    pub(crate) policy: Arc<CompletionPolicy>,
}

impl ThinkingAgent {
    /// Instruction used when the configuration gives none.
    pub fn default_instruction(
        toolbox: &Toolbox,
        max_iterations: u32,
        max_tools_per_step: usize,
        answer_delimiter: &str,
    ) -> String {
        let mut text = String::from(
            "You are a planning agent. Solve the user's query by breaking it into steps \
             and delegating work to the executors and tools below.\n",
        );

        let agents = toolbox.agents();
        if !agents.is_empty() {
            text.push_str("\nExecutors (call them with a `request` argument):\n");
            for agent in agents {
                let _ = write!(text, "- {}: {}", agent.name(), agent.description().trim());
                let tools = agent.tool_names();
                if !tools.is_empty() {
                    let _ = write!(text, " [tools: {}]", tools.join(", "));
                }
                text.push('\n');
            }
        }
        let tools: Vec<&str> = toolbox
            .names()
            .into_iter()
            .filter(|name| !agents_contain(toolbox, name))
            .collect();
        if !tools.is_empty() {
            let _ = writeln!(text, "\nTools: {}", tools.join(", "));
        }

        let _ = write!(
            text,
            "\nWork in iterations; you have at most {max_iterations}. In each iteration:\n\
             1. Plan: list every requirement of the query as a checklist, `- [ ] item` for \
             open items and `- [x] item` for verified ones.\n\
             2. Act: call at most {max_tools_per_step} tools or executors for the open items.\n\
             3. Verify: check the results you received against the original query.\n\n\
             When every requirement is verified, write the final answer, then a line \
             `{answer_delimiter}` followed by `Status: SOLVED`.\n\
             If the query cannot be solved with the capabilities above, write \
             `{answer_delimiter}` followed by `Status: UNSOLVABLE` and explain why.\n"
        );
        text
    }

    /// The user prompt for iteration `n`.
    fn compose_prompt(&self, query: &str, history: &[IterationRecord], n: u32) -> String {
        let mut prompt = format!("Query:\n{query}\n");

        if !history.is_empty() {
            prompt.push_str("\nPrevious iterations:\n");
            for record in history {
                let _ = writeln!(
                    prompt,
                    "--- Iteration {} ({}) ---",
                    record.sequence, record.status
                );
                if !record.text.trim().is_empty() {
                    let _ = writeln!(prompt, "{}", record.text.trim());
                }
                if !record.tool_calls.is_empty() {
                    prompt.push_str("Tool calls:\n");
                    for call in &record.tool_calls {
                        let _ = writeln!(
                            prompt,
                            "- {}({}) -> {}",
                            call.tool,
                            call.arguments,
                            call.render_result()
                        );
                    }
                }
            }
        }

        if let Some(latest) = history.last() {
            let open = unresolved_requirements(&latest.text);
            if !open.is_empty() {
                prompt.push_str("\nUnresolved requirements:\n");
                for item in open {
                    let _ = writeln!(prompt, "- [ ] {item}");
                }
            }
        }

        let _ = write!(prompt, "\nIteration {n} of {}.", self.max_iterations);
        if n == self.max_iterations {
            prompt.push_str(" This is the last iteration: give your best final answer now.");
        }
        prompt
    }

    pub(crate) async fn run(&self, ctx: &ExecutionContext) -> Outcome {
        let name = self.profile.name.as_str();
        let kind = self.profile.kind;
        let query = ctx.input.as_str();
        let definitions = self.toolbox.definitions();
        let mut recorder = SessionRecorder::new(name, query);
        let mut children = Vec::new();
        let mut partial = String::new();
        let mut scope = ctx.clone();
        let mut published = BTreeMap::new();

        for n in 1..=self.max_iterations {
            let prompt = self.compose_prompt(query, recorder.iterations(), n);
            let messages = self.profile.prompt(&scope, prompt);

            let response = match self
                .engine
                .generate(name, ctx, messages, definitions.clone())
                .await
            {
                Ok(response) => response,
                Err(EngineCallError::Engine(e)) => {
                    warn!(agent = name, iteration = n, error = %e, "Thinking loop failed");
                    let session = recorder.finish(OutcomeStatus::Failed(e), partial);
                    return Outcome::from_session(kind, session)
                        .with_children(children)
                        .with_state(published);
                }
                Err(EngineCallError::Interrupted(interruption)) => {
                    let record = recorder.record("", Vec::new(), IterationStatus::Incomplete);
                    publish_iteration(ctx, name, record);
                    info!(agent = name, iteration = n, reason = %interruption, "Thinking loop interrupted");
                    let session = recorder
                        .finish(OutcomeStatus::Incomplete(interruption.into()), partial);
                    return Outcome::from_session(kind, session)
                        .with_children(children)
                        .with_state(published);
                }
            };

            if !response.text.trim().is_empty() {
                partial = self.policy.extract_answer(&response.text);
            }

            match self.policy.detect(&response.text) {
                Completion::Solved => {
                    if !response.tool_calls.is_empty() {
                        debug!(
                            agent = name,
                            ignored = response.tool_calls.len(),
                            "Solved marker present, skipping requested tool calls"
                        );
                    }
                    let record =
                        recorder.record(response.text, Vec::new(), IterationStatus::Solved);
                    publish_iteration(ctx, name, record);
                    info!(agent = name, iterations = n, "Thinking loop solved");
                    let session = recorder.finish(OutcomeStatus::Solved, partial);
                    return Outcome::from_session(kind, session)
                        .with_children(children)
                        .with_state(published);
                }
                Completion::Unsolvable => {
                    let record =
                        recorder.record(response.text, Vec::new(), IterationStatus::Incomplete);
                    publish_iteration(ctx, name, record);
                    info!(agent = name, iterations = n, "Thinking loop declared unsolvable");
                    let session = recorder.finish(
                        OutcomeStatus::Incomplete(IncompleteReason::Unsolvable),
                        partial,
                    );
                    return Outcome::from_session(kind, session)
                        .with_children(children)
                        .with_state(published);
                }
                Completion::Continue => {
                    let round = self
                        .toolbox
                        .dispatch(&response.tool_calls, Some(self.max_tools_per_step), &scope)
                        .await;
                    children.extend(round.children);
                    scope.state.extend(round.state.clone());
                    published.extend(round.state);

                    let status = if round.interrupted.is_some() || n == self.max_iterations {
                        IterationStatus::Incomplete
                    } else {
                        IterationStatus::Continuing
                    };
                    let record = recorder.record(response.text, round.records, status);
                    publish_iteration(ctx, name, record);

                    if let Some(interruption) = round.interrupted {
                        info!(agent = name, iteration = n, reason = %interruption, "Thinking loop interrupted");
                        let session = recorder
                            .finish(OutcomeStatus::Incomplete(interruption.into()), partial);
                        return Outcome::from_session(kind, session)
                            .with_children(children)
                            .with_state(published);
                    }
                }
            }
        }

        info!(
            agent = name,
            max_iterations = self.max_iterations,
            "Thinking loop reached its iteration bound"
        );
        let session = recorder.finish(
            OutcomeStatus::Incomplete(IncompleteReason::MaxIterations {
                limit: self.max_iterations,
            }),
            partial,
        );
        Outcome::from_session(kind, session)
            .with_children(children)
            .with_state(published)
    }
}

fn agents_contain(toolbox: &Toolbox, name: &str) -> bool {
    toolbox.agents().iter().any(|agent| agent.name() == name)
}
