//! Domain events and the append-only trace journal.
//!
//! Agents publish events as they run (engine calls, tool calls, iterations,
//! routing decisions). The bus is the only state shared between parallel
//! branches: subscribers receive events live and the journal keeps every
//! event in publication order for the end-of-run trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An agent began executing
    AgentStarted {
        agent: String,
        kind: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent finished executing
    AgentFinished {
        agent: String,
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// The reasoning engine answered (or failed)
    EngineCalled {
        agent: String,
        model: String,
        success: bool,
        tokens_used: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed through its proxy
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An iterative agent recorded an iteration
    IterationRecorded {
        agent: String,
        sequence: u32,
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// A dispatcher chose its downstream route
    RouteSelected {
        dispatcher: String,
        route: String,
        fallback: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus with an append-only journal.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
    journal: Mutex<Vec<Arc<DomainEvent>>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Publish an event to the journal and all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        let event = Arc::new(event);
        match self.journal.lock() {
            Ok(mut journal) => journal.push(Arc::clone(&event)),
            Err(poisoned) => {
                tracing::warn!("Event journal lock poisoned, recovering");
                poisoned.into_inner().push(Arc::clone(&event));
            }
        }
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }

    /// Snapshot of every event published so far, in publication order.
    pub fn history(&self) -> Vec<Arc<DomainEvent>> {
        match self.journal.lock() {
            Ok(journal) => journal.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.history().len())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
