//! Per-run execution context.
//!
//! A context carries the verbatim query, the input the current agent should
//! work on, the shared `output_key` state, the event journal and the
//! interruption signals. Cloning is cheap; parallel branches each get their
//! own copy.

use ltm_core::event::EventBus;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a run stopped before it reached a terminal state on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for Interruption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The user query, never modified
    pub query: String,
    /// What the current agent should work on (the query, or the previous step's answer)
    pub input: String,
    /// Values published by agents with an `output_key`
    pub state: BTreeMap<String, String>,
    pub events: Arc<EventBus>,
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

impl ExecutionContext {
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            input: query.clone(),
            query,
            state: BTreeMap::new(),
            events: Arc::new(EventBus::default()),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// A copy of this context that works on `input` instead.
    pub fn with_input(&self, input: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.input = input.into();
        ctx
    }

    /// The interruption already in effect, if any.
    pub fn interruption(&self) -> Option<Interruption> {
        if self.cancel.is_cancelled() {
            return Some(Interruption::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interruption::DeadlineExceeded),
            _ => None,
        }
    }

    /// Await `fut` unless the run is cancelled or its deadline passes first.
    pub async fn interruptible<F: Future>(&self, fut: F) -> Result<F::Output, Interruption> {
        if let Some(interruption) = self.interruption() {
            return Err(interruption);
        }
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interruption::Cancelled),
            _ = deadline => Err(Interruption::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}
