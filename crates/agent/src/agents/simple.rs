use ltm_core::message::Message;

use super::{AgentProfile, EngineBinding, Toolbox, abandon, publish_iteration};
use crate::context::ExecutionContext;
use crate::outcome::{Outcome, OutcomeStatus};
use crate::session::{IterationStatus, SessionRecorder};

/// One engine call, at most one tool round, then a synthesis call.
#[derive(Debug)]
pub struct SimpleAgent {
    pub(crate) profile: AgentProfile,
    pub(crate) engine: EngineBinding,
    pub(crate) toolbox: Toolbox,
    pub(crate) max_tools_per_step: usize,
}

impl SimpleAgent {
    pub(crate) async fn run(&self, ctx: &ExecutionContext) -> Outcome {
        let name = self.profile.name.as_str();
        let kind = self.profile.kind;
        let mut recorder = SessionRecorder::new(name, &ctx.input);
        let mut messages = self.profile.prompt(ctx, ctx.input.as_str());

        let first = match self
            .engine
            .generate(name, ctx, messages.clone(), self.toolbox.definitions())
            .await
        {
            Ok(response) => response,
            Err(e) => return abandon(kind, recorder, e, ""),
        };

        if first.tool_calls.is_empty() {
            let answer = first.text.trim().to_string();
            let record = recorder.record(first.text, Vec::new(), IterationStatus::Solved);
            publish_iteration(ctx, name, record);
            return Outcome::from_session(kind, recorder.finish(OutcomeStatus::Solved, answer));
        }

        let round = self
            .toolbox
            .dispatch(&first.tool_calls, Some(self.max_tools_per_step), ctx)
            .await;
        messages.push(first.to_message());
        for (call, record) in first.tool_calls.iter().zip(&round.records) {
            messages.push(Message::tool_result(&call.id, record.render_result()));
        }

        let status = if round.interrupted.is_some() {
            IterationStatus::Incomplete
        } else {
            IterationStatus::Continuing
        };
        let partial = first.text.trim().to_string();
        let record = recorder.record(first.text, round.records, status);
        publish_iteration(ctx, name, record);
        let children = round.children;
        let published = round.state;

        if let Some(interruption) = round.interrupted {
            let session = recorder.finish(OutcomeStatus::Incomplete(interruption.into()), partial);
            return Outcome::from_session(kind, session)
                .with_children(children)
                .with_state(published);
        }

        match self.engine.generate(name, ctx, messages, Vec::new()).await {
            Ok(synthesis) => {
                let answer = synthesis.text.trim().to_string();
                let record = recorder.record(synthesis.text, Vec::new(), IterationStatus::Solved);
                publish_iteration(ctx, name, record);
                Outcome::from_session(kind, recorder.finish(OutcomeStatus::Solved, answer))
                    .with_children(children)
                    .with_state(published)
            }
            Err(e) => abandon(kind, recorder, e, partial)
                .with_children(children)
                .with_state(published),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Agent, ToolBinding};
    use crate::test_helpers::{ScriptedEngine, binding, make_tool_call, profile};
    use ltm_config::AgentKind;
    use ltm_core::engine::EngineResponse;
    use ltm_core::error::ReasoningEngineError;
    use ltm_core::tool::{FnTool, ToolHandle};
    use ltm_tools::ToolProxy;
    use std::sync::Arc;

    fn agent(engine: Arc<ScriptedEngine>, toolbox: Toolbox) -> Agent {
        Agent::Simple(SimpleAgent {
            profile: profile("assistant", AgentKind::Simple, "Be helpful"),
            engine: binding(engine),
            toolbox,
            max_tools_per_step: 5,
        })
    }

    #[tokio::test]
    async fn text_answer_is_solved_in_one_call() {
        let engine = Arc::new(ScriptedEngine::new(vec![EngineResponse::text("m", " Hello! ")]));
        let outcome = agent(Arc::clone(&engine), Toolbox::new())
            .execute(&ExecutionContext::new("hi"))
            .await;

        assert!(outcome.is_solved());
        assert_eq!(outcome.answer, "Hello!");
        assert_eq!(outcome.iterations().len(), 1);
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_round_then_synthesis() {
        let mut tools = Toolbox::new();
        tools.push(
            "lookup",
            ToolBinding::Tool(Arc::new(ToolProxy::new(
                "lookup",
                "test:lookup",
                ToolHandle::sync(FnTool::new("Looks up", serde_json::json!({}), |_| {
                    Ok(serde_json::json!("Alice"))
                })),
            ))),
        );
        let engine = Arc::new(ScriptedEngine::new(vec![
            make_tool_call("lookup", serde_json::json!({"id": 1})),
            EngineResponse::text("m", "The user is Alice."),
        ]));

        let outcome = agent(Arc::clone(&engine), tools)
            .execute(&ExecutionContext::new("who is user 1?"))
            .await;

        assert!(outcome.is_solved());
        assert_eq!(outcome.answer, "The user is Alice.");
        assert_eq!(outcome.iterations()[0].tool_calls.len(), 1);

        let requests = engine.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].tools.is_empty());
        assert!(requests[1].messages.iter().any(|m| m.content == "Alice"));
    }

    #[tokio::test]
    async fn engine_failure_is_a_failed_outcome() {
        let engine = Arc::new(ScriptedEngine::failing(ReasoningEngineError::Network(
            "connection refused".into(),
        )));
        let outcome = agent(engine, Toolbox::new())
            .execute(&ExecutionContext::new("hi"))
            .await;
        assert!(outcome.is_failed());
    }
}
