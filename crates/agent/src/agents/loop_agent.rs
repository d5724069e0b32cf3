use std::sync::Arc;
use tracing::debug;

use super::{Agent, AgentProfile, publish_iteration};
use crate::context::ExecutionContext;
use crate::marker::{Completion, CompletionPolicy};
use crate::outcome::{IncompleteReason, Outcome, OutcomeStatus};
use crate::session::{IterationStatus, SessionRecorder};

/// Decides after each pass whether a loop is done.
pub trait TerminationPredicate: Send + Sync + std::fmt::Debug {
    fn evaluate(&self, pass: u32, answer: &str) -> Completion;
}

/// Stops a loop when the pass answer carries a completion marker.
#[derive(Debug, Clone)]
pub struct PolicyPredicate(pub Arc<CompletionPolicy>);

impl TerminationPredicate for PolicyPredicate {
    fn evaluate(&self, _pass: u32, answer: &str) -> Completion {
        self.0.detect(answer)
    }
}

/// Repeats its body up to `max_iterations` times.
#[derive(Debug)]
pub struct LoopAgent {
    pub(crate) profile: AgentProfile,
    pub(crate) body: Vec<Arc<Agent>>,
    pub(crate) max_iterations: u32,
    pub(crate) predicate: Arc<dyn TerminationPredicate>,
    pub(crate) policy: Arc<CompletionPolicy>,
}

impl LoopAgent {
    pub(crate) async fn run(&self, ctx: &ExecutionContext) -> Outcome {
        let name = self.profile.name.as_str();
        let kind = self.profile.kind;
        let mut recorder = SessionRecorder::new(name, &ctx.input);
        let mut state = ctx.state.clone();
        let mut children = Vec::new();
        let mut answer = String::new();

        for pass in 1..=self.max_iterations {
            let mut input = if answer.is_empty() {
                ctx.input.clone()
            } else {
                format!("{}\n\nPrevious attempt:\n{answer}", ctx.input)
            };

            let mut halted = None;
            for agent in &self.body {
                let mut step_ctx = ctx.with_input(input.clone());
                step_ctx.state = state.clone();
                let outcome = agent.execute(&step_ctx).await;
                state.extend(outcome.state.clone());
                if !outcome.answer.trim().is_empty() {
                    answer = outcome.answer.clone();
                    input = outcome.answer.clone();
                }
                if outcome.is_failed() || outcome.status.is_interrupted() {
                    halted = Some(outcome.status.clone());
                }
                children.push(outcome);
                if halted.is_some() {
                    break;
                }
            }

            if let Some(status) = halted {
                let record = recorder.record(answer.clone(), Vec::new(), IterationStatus::Incomplete);
                publish_iteration(ctx, name, record);
                debug!(agent = name, pass, status = %status, "Loop halted by a sub-agent");
                let session = recorder.finish(status, self.policy.extract_answer(&answer));
                return Outcome::from_session(kind, session)
                    .with_children(children)
                    .with_state(state);
            }

            let decision = self.predicate.evaluate(pass, &answer);
            let iteration_status = match decision {
                Completion::Solved => IterationStatus::Solved,
                Completion::Unsolvable => IterationStatus::Incomplete,
                Completion::Continue if pass == self.max_iterations => IterationStatus::Incomplete,
                Completion::Continue => IterationStatus::Continuing,
            };
            let record = recorder.record(answer.clone(), Vec::new(), iteration_status);
            publish_iteration(ctx, name, record);

            let status = match decision {
                Completion::Solved => OutcomeStatus::Solved,
                Completion::Unsolvable => OutcomeStatus::Incomplete(IncompleteReason::Unsolvable),
                Completion::Continue => continue,
            };
            let session = recorder.finish(status, self.policy.extract_answer(&answer));
            return Outcome::from_session(kind, session)
                .with_children(children)
                .with_state(state);
        }

        let session = recorder.finish(
            OutcomeStatus::Incomplete(IncompleteReason::MaxIterations {
                limit: self.max_iterations,
            }),
            self.policy.extract_answer(&answer),
        );
        Outcome::from_session(kind, session)
            .with_children(children)
            .with_state(state)
    }
}
