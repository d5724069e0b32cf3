//! What an agent hands back to its caller.

use ltm_config::AgentKind;
use ltm_core::error::ReasoningEngineError;
use std::collections::BTreeMap;

use crate::context::Interruption;
use crate::session::{IterationRecord, ReasoningSession};

/// Why an outcome is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteReason {
    /// The iteration bound was reached without a completion marker
    MaxIterations { limit: u32 },
    /// The engine declared the query unsolvable
    Unsolvable,
    Cancelled,
    DeadlineExceeded,
}

impl From<Interruption> for IncompleteReason {
    fn from(interruption: Interruption) -> Self {
        match interruption {
            Interruption::Cancelled => Self::Cancelled,
            Interruption::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

impl std::fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaxIterations { limit } => write!(f, "max iterations ({limit}) reached"),
            Self::Unsolvable => write!(f, "declared unsolvable"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Solved,
    Incomplete(IncompleteReason),
    Failed(ReasoningEngineError),
}

impl OutcomeStatus {
    /// Cancellation and deadlines stop everything above them too.
    pub fn is_interrupted(&self) -> bool {
        self.interruption().is_some()
    }

    pub fn interruption(&self) -> Option<Interruption> {
        match self {
            Self::Incomplete(IncompleteReason::Cancelled) => Some(Interruption::Cancelled),
            Self::Incomplete(IncompleteReason::DeadlineExceeded) => {
                Some(Interruption::DeadlineExceeded)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Solved => write!(f, "solved"),
            Self::Incomplete(reason) => write!(f, "incomplete: {reason}"),
            Self::Failed(error) => write!(f, "failed: {error}"),
        }
    }
}

/// The result of one agent execution, with the outcomes of the agents it ran.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub agent: String,
    pub kind: AgentKind,
    pub status: OutcomeStatus,
    pub answer: String,
    /// Iteration history, for agents that call the engine
    pub session: Option<ReasoningSession>,
    pub children: Vec<Outcome>,
    /// The route a dispatcher chose
    pub route: Option<String>,
    /// `output_key` values published so far
    pub state: BTreeMap<String, String>,
}

impl Outcome {
    pub fn new(
        agent: impl Into<String>,
        kind: AgentKind,
        status: OutcomeStatus,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            kind,
            status,
            answer: answer.into(),
            session: None,
            children: Vec::new(),
            route: None,
            state: BTreeMap::new(),
        }
    }

    /// An outcome carrying a finished session's status and answer.
    pub fn from_session(kind: AgentKind, session: ReasoningSession) -> Self {
        let mut outcome = Self::new(
            session.agent(),
            kind,
            session.status().clone(),
            session.answer(),
        );
        outcome.session = Some(session);
        outcome
    }

    pub fn with_children(mut self, children: Vec<Outcome>) -> Self {
        self.children = children;
        self
    }

    pub fn with_state(mut self, state: BTreeMap<String, String>) -> Self {
        self.state = state;
        self
    }

    pub fn is_solved(&self) -> bool {
        self.status == OutcomeStatus::Solved
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed(_))
    }

    pub fn iterations(&self) -> &[IterationRecord] {
        self.session
            .as_ref()
            .map(ReasoningSession::iterations)
            .unwrap_or_default()
    }
}
