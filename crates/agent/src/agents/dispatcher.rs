use chrono::Utc;
use ltm_core::event::DomainEvent;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

use super::{Agent, AgentProfile, EngineBinding, EngineCallError};
use crate::context::ExecutionContext;
use crate::outcome::{Outcome, OutcomeStatus};

/// Classifies the input with one engine call and hands it to one route.
#[derive(Debug)]
pub struct DispatcherAgent {
    pub(crate) profile: AgentProfile,
    pub(crate) engine: EngineBinding,
    pub(crate) routes: Vec<(String, Arc<Agent>)>,
    pub(crate) default_route: Option<String>,
}

/// A route choice and whether it came from a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteChoice {
    pub route: String,
    pub fallback: bool,
}

/// Match the classifier's reply against the route names.
///
/// Exact (case-insensitive, quotes and punctuation trimmed) first, then a
/// single whole-word mention, then the default route, then the first route.
pub fn select_route(reply: &str, routes: &[&str], default_route: Option<&str>) -> RouteChoice {
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '-';
    let normalized = reply.trim().trim_matches(|c: char| !is_word(c)).to_lowercase();

    if let Some(route) = routes.iter().find(|r| r.to_lowercase() == normalized) {
        return RouteChoice {
            route: route.to_string(),
            fallback: false,
        };
    }

    let lowered = reply.to_lowercase();
    let words: Vec<&str> = lowered.split(|c: char| !is_word(c)).collect();
    let mentioned: Vec<&&str> = routes
        .iter()
        .filter(|r| words.contains(&r.to_lowercase().as_str()))
        .collect();
    if let [route] = mentioned.as_slice() {
        return RouteChoice {
            route: route.to_string(),
            fallback: false,
        };
    }

    let route = default_route
        .or_else(|| routes.first().copied())
        .unwrap_or_default()
        .to_string();
    RouteChoice {
        route,
        fallback: true,
    }
}

impl DispatcherAgent {
    fn classification_prompt(&self) -> String {
        let mut text = self.profile.instruction.trim().to_string();
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str("Choose the single best route for the request. Candidates:\n");
        for (name, agent) in &self.routes {
            let _ = writeln!(text, "- {name}: {}", agent.description().trim());
        }
        text.push_str("Reply with the route name only.");
        text
    }

    pub(crate) async fn run(&self, ctx: &ExecutionContext) -> Outcome {
        let name = self.profile.name.as_str();
        let kind = self.profile.kind;
        let messages = vec![
            ltm_core::message::Message::system(self.classification_prompt()),
            ltm_core::message::Message::user(ctx.input.as_str()),
        ];

        let reply = match self.engine.generate(name, ctx, messages, Vec::new()).await {
            Ok(response) => response.text,
            Err(EngineCallError::Engine(e)) => {
                return Outcome::new(name, kind, OutcomeStatus::Failed(e), "");
            }
            Err(EngineCallError::Interrupted(i)) => {
                return Outcome::new(name, kind, OutcomeStatus::Incomplete(i.into()), "");
            }
        };

        let names: Vec<&str> = self.routes.iter().map(|(n, _)| n.as_str()).collect();
        let choice = select_route(&reply, &names, self.default_route.as_deref());
        info!(
            agent = name,
            route = %choice.route,
            fallback = choice.fallback,
            reply = %reply.trim(),
            "Route selected"
        );
        ctx.events.publish(DomainEvent::RouteSelected {
            dispatcher: name.to_string(),
            route: choice.route.clone(),
            fallback: choice.fallback,
            timestamp: Utc::now(),
        });

        let Some((_, target)) = self.routes.iter().find(|(n, _)| *n == choice.route) else {
            // Routes are validated at build time; an empty list cannot get here.
            return Outcome::new(
                name,
                kind,
                OutcomeStatus::Failed(ltm_core::error::ReasoningEngineError::MalformedResponse(
                    format!("no route named '{}'", choice.route),
                )),
                "",
            );
        };

        let child = target.execute(ctx).await;
        let mut outcome = Outcome::new(name, kind, child.status.clone(), child.answer.clone())
            .with_state(child.state.clone());
        outcome.route = Some(choice.route);
        outcome.with_children(vec![child])
    }
}
