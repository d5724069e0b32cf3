use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Agent, AgentProfile};
use crate::context::ExecutionContext;
use crate::outcome::{Outcome, OutcomeStatus};

/// Runs its branches concurrently on independent context copies and merges
/// the results in declared order.
#[derive(Debug)]
pub struct ParallelAgent {
    pub(crate) profile: AgentProfile,
    pub(crate) branches: Vec<Arc<Agent>>,
}

impl ParallelAgent {
    pub(crate) async fn run(&self, ctx: &ExecutionContext) -> Outcome {
        // join_all yields results in input order, whatever order they finish in
        let outcomes = join_all(self.branches.iter().map(|branch| {
            let branch_ctx = ctx.clone();
            async move { branch.execute(&branch_ctx).await }
        }))
        .await;

        let answer = outcomes
            .iter()
            .map(|o| format!("[{}]\n{}", o.agent, o.answer.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut state = BTreeMap::new();
        for outcome in &outcomes {
            state.extend(outcome.state.clone());
        }

        Outcome::new(
            &self.profile.name,
            self.profile.kind,
            merged_status(&outcomes),
            answer,
        )
        .with_children(outcomes)
        .with_state(state)
    }
}

/// First failure in declared order, else first incomplete, else solved.
fn merged_status(outcomes: &[Outcome]) -> OutcomeStatus {
    outcomes
        .iter()
        .find(|o| o.is_failed())
        .or_else(|| outcomes.iter().find(|o| !o.is_solved()))
        .map_or(OutcomeStatus::Solved, |o| o.status.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{SimpleAgent, Toolbox};
    use crate::outcome::IncompleteReason;
    use crate::test_helpers::{ScriptedEngine, binding, profile};
    use ltm_config::AgentKind;
    use std::time::Duration;

    fn branch(name: &str, text: &str, latency_ms: u64) -> Arc<Agent> {
        let engine = ScriptedEngine::single_text(text).with_latency(Duration::from_millis(latency_ms));
        Arc::new(Agent::Simple(SimpleAgent {
            profile: profile(name, AgentKind::Simple, ""),
            engine: binding(Arc::new(engine)),
            toolbox: Toolbox::new(),
            max_tools_per_step: 5,
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn merge_follows_declared_order_not_finish_order() {
        let agent = Agent::Parallel(ParallelAgent {
            profile: profile("fanout", AgentKind::Parallel, ""),
            branches: vec![
                branch("slow", "A", 300),
                branch("fast", "B", 10),
                branch("medium", "C", 100),
            ],
        });

        let outcome = agent.execute(&ExecutionContext::new("q")).await;

        assert!(outcome.is_solved());
        assert_eq!(outcome.answer, "[slow]\nA\n\n[fast]\nB\n\n[medium]\nC");
        let order: Vec<&str> = outcome.children.iter().map(|o| o.agent.as_str()).collect();
        assert_eq!(order, vec!["slow", "fast", "medium"]);
    }

    #[test]
    fn failure_outranks_incomplete() {
        let incomplete = Outcome::new(
            "a",
            AgentKind::Loop,
            OutcomeStatus::Incomplete(IncompleteReason::MaxIterations { limit: 1 }),
            "",
        );
        let failed = Outcome::new(
            "b",
            AgentKind::Simple,
            OutcomeStatus::Failed(ltm_core::error::ReasoningEngineError::Network("x".into())),
            "",
        );
        let solved = Outcome::new("c", AgentKind::Simple, OutcomeStatus::Solved, "");

        assert!(matches!(
            merged_status(&[incomplete.clone(), failed, solved.clone()]),
            OutcomeStatus::Failed(_)
        ));
        assert!(matches!(
            merged_status(&[solved.clone(), incomplete]),
            OutcomeStatus::Incomplete(_)
        ));
        assert_eq!(merged_status(&[solved]), OutcomeStatus::Solved);
    }
}
