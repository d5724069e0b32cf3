//! The tools one agent may call, and the dispatch of a tool round.
//!
//! A binding is either a resolved tool or another agent exposed as a tool.
//! Agent tools take a single `request` string and answer with the agent's
//! final text.

use chrono::Utc;
use ltm_core::engine::ToolDefinition;
use ltm_core::error::ToolError;
use ltm_core::event::DomainEvent;
use ltm_core::message::MessageToolCall;
use ltm_tools::{ToolCallRecord, ToolInvocationFailure, ToolProxy};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::Agent;
use crate::context::{ExecutionContext, Interruption};
use crate::outcome::{Outcome, OutcomeStatus};

#[derive(Debug, Clone)]
pub enum ToolBinding {
    Tool(Arc<ToolProxy>),
    Agent(Arc<Agent>),
}

/// Everything a tool round produced.
#[derive(Debug, Default)]
pub struct ToolRound {
    /// One record per requested call, in request order
    pub records: Vec<ToolCallRecord>,
    /// Outcomes of agents invoked as tools
    pub children: Vec<Outcome>,
    /// `output_key` values published by those agents
    pub state: BTreeMap<String, String>,
    pub interrupted: Option<Interruption>,
}

#[derive(Debug, Default)]
pub struct Toolbox {
    bindings: Vec<(String, ToolBinding)>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, binding: ToolBinding) {
        self.bindings.push((name.into(), binding));
    }

    pub fn get(&self, name: &str) -> Option<&ToolBinding> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, binding)| binding)
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn agents(&self) -> Vec<&Arc<Agent>> {
        self.bindings
            .iter()
            .filter_map(|(_, binding)| match binding {
                ToolBinding::Agent(agent) => Some(agent),
                ToolBinding::Tool(_) => None,
            })
            .collect()
    }

    /// Definitions advertised to the engine, in declared order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.bindings
            .iter()
            .map(|(name, binding)| match binding {
                ToolBinding::Tool(proxy) => {
                    let mut definition = proxy.definition();
                    definition.name = name.clone();
                    definition
                }
                ToolBinding::Agent(agent) => agent_tool_definition(name, agent),
            })
            .collect()
    }

    /// Run the requested calls in request order. Calls beyond `limit`, calls
    /// to unknown tools and calls after an interruption are recorded as
    /// failures without running anything.
    pub async fn dispatch(
        &self,
        calls: &[MessageToolCall],
        limit: Option<usize>,
        ctx: &ExecutionContext,
    ) -> ToolRound {
        let mut round = ToolRound::default();

        for (index, call) in calls.iter().enumerate() {
            let arguments = call.parsed_arguments();
            let started_at = Utc::now();

            if let Some(limit) = limit
                && index >= limit
            {
                debug!(tool = %call.name, limit, "Tool call over the per-step limit");
                round.records.push(ToolCallRecord::failed(
                    &call.name,
                    arguments,
                    ToolError::LimitExceeded { limit },
                    started_at,
                ));
                continue;
            }

            if let Some(interruption) = round.interrupted {
                round.records.push(ToolCallRecord::failed(
                    &call.name,
                    arguments,
                    ToolError::Interrupted(interruption.to_string()),
                    started_at,
                ));
                continue;
            }

            match self.get(&call.name) {
                None => {
                    warn!(tool = %call.name, "Engine requested an unknown tool");
                    round.records.push(ToolCallRecord::failed(
                        &call.name,
                        arguments,
                        ToolError::NotFound(call.name.clone()),
                        started_at,
                    ));
                }
                Some(ToolBinding::Tool(proxy)) => {
                    match ctx
                        .interruptible(proxy.call(arguments.clone(), &ctx.events))
                        .await
                    {
                        Ok(record) => round.records.push(record),
                        Err(interruption) => {
                            round.records.push(ToolCallRecord::failed(
                                &call.name,
                                arguments,
                                ToolError::Interrupted(interruption.to_string()),
                                started_at,
                            ));
                            round.interrupted = Some(interruption);
                        }
                    }
                }
                Some(ToolBinding::Agent(agent)) => {
                    let mut scope = ctx.clone();
                    scope.state.extend(round.state.clone());
                    let (record, child) = call_agent(&call.name, agent, arguments, &scope).await;
                    if let Some(child) = child {
                        round.interrupted = child.status.interruption();
                        round.state.extend(child.state.clone());
                        round.children.push(child);
                    }
                    round.records.push(record);
                }
            }
        }

        round
    }
}

fn agent_tool_definition(name: &str, agent: &Agent) -> ToolDefinition {
    let description = if agent.description().trim().is_empty() {
        format!("Delegate a request to the '{name}' agent")
    } else {
        agent.description().to_string()
    };
    ToolDefinition {
        name: name.to_string(),
        description,
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "What the agent should do, with all the context it needs"
                }
            },
            "required": ["request"]
        }),
    }
}

fn request_text(arguments: &serde_json::Value) -> Option<String> {
    let text = match arguments {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => match map.get("request") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => return None,
        },
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

async fn call_agent(
    name: &str,
    agent: &Arc<Agent>,
    arguments: serde_json::Value,
    ctx: &ExecutionContext,
) -> (ToolCallRecord, Option<Outcome>) {
    let started_at = Utc::now();
    let Some(request) = request_text(&arguments) else {
        return (
            ToolCallRecord::failed(
                name,
                arguments,
                ToolError::InvalidArguments("agent tools need a non-empty 'request' string".into()),
                started_at,
            ),
            None,
        );
    };

    let start = Instant::now();
    let child = agent.execute(&ctx.with_input(request)).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let result = match &child.status {
        OutcomeStatus::Solved => Ok(serde_json::Value::String(child.answer.clone())),
        OutcomeStatus::Incomplete(reason) => Ok(serde_json::Value::String(format!(
            "{}\n[{} stopped early: {reason}]",
            child.answer.trim(),
            agent.name()
        ))),
        OutcomeStatus::Failed(error) => Err(ToolInvocationFailure {
            tool: name.to_string(),
            error: ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: error.to_string(),
            },
        }),
    };

    info!(tool = name, agent = %agent.name(), status = %child.status, duration_ms, "Agent tool finished");
    ctx.events.publish(DomainEvent::ToolExecuted {
        tool_name: name.to_string(),
        success: result.is_ok(),
        duration_ms,
        timestamp: Utc::now(),
    });

    let record = ToolCallRecord {
        tool: name.to_string(),
        arguments,
        result,
        started_at,
        finished_at: Utc::now(),
    };
    (record, Some(child))
}
