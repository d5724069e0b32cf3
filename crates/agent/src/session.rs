//! Append-only reasoning sessions.
//!
//! A [`SessionRecorder`] is the only way to add iterations. Finishing it
//! consumes the recorder, so a terminated session can never grow again.

use chrono::{DateTime, Utc};

use crate::outcome::OutcomeStatus;

pub use ltm_tools::ToolCallRecord;

/// Status tag of one recorded iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationStatus {
    Continuing,
    Solved,
    Incomplete,
}

impl std::fmt::Display for IterationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continuing => write!(f, "continuing"),
            Self::Solved => write!(f, "solved"),
            Self::Incomplete => write!(f, "incomplete"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IterationRecord {
    /// 1-based, strictly increasing, no gaps
    pub sequence: u32,
    /// The engine text for this iteration (plan, verification or answer)
    pub text: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub status: IterationStatus,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionRecorder {
    agent: String,
    query: String,
    iterations: Vec<IterationRecord>,
    started_at: DateTime<Utc>,
}

impl SessionRecorder {
    pub fn new(agent: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            query: query.into(),
            iterations: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Append the next iteration and return it.
    pub fn record(
        &mut self,
        text: impl Into<String>,
        tool_calls: Vec<ToolCallRecord>,
        status: IterationStatus,
    ) -> &IterationRecord {
        let sequence = self.iterations.len() as u32 + 1;
        self.iterations.push(IterationRecord {
            sequence,
            text: text.into(),
            tool_calls,
            status,
            recorded_at: Utc::now(),
        });
        &self.iterations[self.iterations.len() - 1]
    }

    pub fn iterations(&self) -> &[IterationRecord] {
        &self.iterations
    }

    /// Close the session with its terminal state.
    pub fn finish(self, status: OutcomeStatus, answer: impl Into<String>) -> ReasoningSession {
        ReasoningSession {
            agent: self.agent,
            query: self.query,
            iterations: self.iterations,
            status,
            answer: answer.into(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// A terminated session. Read-only.
#[derive(Debug, Clone)]
pub struct ReasoningSession {
    agent: String,
    query: String,
    iterations: Vec<IterationRecord>,
    status: OutcomeStatus,
    answer: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl ReasoningSession {
    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn iterations(&self) -> &[IterationRecord] {
        &self.iterations
    }

    pub fn status(&self) -> &OutcomeStatus {
        &self.status
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::IncompleteReason;

    #[test]
    fn sequences_start_at_one_without_gaps() {
        let mut recorder = SessionRecorder::new("thinker", "q");
        recorder.record("plan", vec![], IterationStatus::Continuing);
        recorder.record("verify", vec![], IterationStatus::Continuing);
        let last = recorder.record("done", vec![], IterationStatus::Solved);
        assert_eq!(last.sequence, 3);

        let session = recorder.finish(OutcomeStatus::Solved, "done");
        let sequences: Vec<u32> = session.iterations().iter().map(|i| i.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(session.query(), "q");
        assert!(session.started_at() <= session.finished_at());
    }

    #[test]
    fn finished_session_keeps_its_terminal_state() {
        let mut recorder = SessionRecorder::new("thinker", "q");
        recorder.record("partial", vec![], IterationStatus::Incomplete);
        let session = recorder.finish(
            OutcomeStatus::Incomplete(IncompleteReason::MaxIterations { limit: 1 }),
            "partial",
        );
        assert!(matches!(session.status(), OutcomeStatus::Incomplete(_)));
        assert_eq!(session.answer(), "partial");
    }
}
