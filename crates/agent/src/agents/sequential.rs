use std::sync::Arc;
use tracing::debug;

use super::{Agent, AgentProfile};
use crate::context::ExecutionContext;
use crate::outcome::{Outcome, OutcomeStatus};

/// Runs its steps in declared order. Each step works on the previous step's
/// answer; shared state accumulates across steps.
#[derive(Debug)]
pub struct SequentialAgent {
    pub(crate) profile: AgentProfile,
    pub(crate) steps: Vec<Arc<Agent>>,
}

impl SequentialAgent {
    pub(crate) async fn run(&self, ctx: &ExecutionContext) -> Outcome {
        let mut input = ctx.input.clone();
        let mut state = ctx.state.clone();
        let mut children = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let mut step_ctx = ctx.with_input(input.clone());
            step_ctx.state = state.clone();

            let outcome = step.execute(&step_ctx).await;
            state.extend(outcome.state.clone());
            if !outcome.answer.trim().is_empty() {
                input = outcome.answer.clone();
            }

            let stop = outcome.is_failed() || outcome.status.is_interrupted();
            if stop {
                debug!(
                    agent = %self.profile.name,
                    step = index + 1,
                    status = %outcome.status,
                    "Sequence stopped early"
                );
            }
            children.push(outcome);
            if stop {
                break;
            }
        }

        let (status, answer) = match children.last() {
            Some(last) => (last.status.clone(), last.answer.clone()),
            None => (OutcomeStatus::Solved, input),
        };
        Outcome::new(&self.profile.name, self.profile.kind, status, answer)
            .with_children(children)
            .with_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{SimpleAgent, Toolbox};
    use crate::test_helpers::{ScriptedEngine, binding, profile};
    use ltm_config::AgentKind;
    use ltm_core::error::ReasoningEngineError;

    fn step(name: &str, engine: Arc<ScriptedEngine>, output_key: Option<&str>) -> Arc<Agent> {
        let mut profile = profile(name, AgentKind::Simple, "");
        profile.output_key = output_key.map(str::to_string);
        Arc::new(Agent::Simple(SimpleAgent {
            profile,
            engine: binding(engine),
            toolbox: Toolbox::new(),
            max_tools_per_step: 5,
        }))
    }

    fn sequence(steps: Vec<Arc<Agent>>) -> Agent {
        Agent::Sequential(SequentialAgent {
            profile: profile("pipeline", AgentKind::Sequential, ""),
            steps,
        })
    }

    #[tokio::test]
    async fn answers_chain_and_state_accumulates() {
        let first = Arc::new(ScriptedEngine::single_text("draft v1"));
        let second = Arc::new(ScriptedEngine::single_text("draft v2"));
        let agent = sequence(vec![
            step("writer", Arc::clone(&first), Some("draft")),
            step("editor", Arc::clone(&second), Some("final")),
        ]);

        let outcome = agent.execute(&ExecutionContext::new("write a poem")).await;

        assert!(outcome.is_solved());
        assert_eq!(outcome.answer, "draft v2");
        assert_eq!(first.prompt(0), "write a poem");
        assert_eq!(second.prompt(0), "draft v1");
        assert_eq!(outcome.state.get("draft").map(String::as_str), Some("draft v1"));
        assert_eq!(outcome.state.get("final").map(String::as_str), Some("draft v2"));
        assert_eq!(outcome.children.len(), 2);
    }

    #[tokio::test]
    async fn failed_step_stops_the_sequence() {
        let failing = Arc::new(ScriptedEngine::failing(ReasoningEngineError::Timeout(
            "slow".into(),
        )));
        let never = Arc::new(ScriptedEngine::single_text("unreachable"));
        let agent = sequence(vec![
            step("first", failing, None),
            step("second", Arc::clone(&never), None),
        ]);

        let outcome = agent.execute(&ExecutionContext::new("q")).await;

        assert!(outcome.is_failed());
        assert_eq!(outcome.children.len(), 1);
        assert_eq!(never.call_count(), 0);
    }
}
