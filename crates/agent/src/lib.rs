//! Agent strategies and pipeline assembly for LTM.
//!
//! A pipeline is a graph of agents built from a [`PipelineSpec`]:
//!
//! 1. **Validate** names, references, bounds and routes
//! 2. **Resolve** declared tools through the closed catalog
//! 3. **Build** agents bottom-up through a memoized [`AgentRegistry`]
//! 4. **Run** the entry agent; every agent returns an [`Outcome`]
//!
//! The [`ThinkingAgent`] is the bounded plan → act → verify loop. It keeps an
//! append-only [`ReasoningSession`] and stops on a completion marker, on an
//! unsolvable marker, at `max_iterations`, or when the run is interrupted.
//!
//! [`PipelineSpec`]: ltm_config::PipelineSpec

pub mod agents;
pub mod builder;
pub mod context;
pub mod marker;
pub mod outcome;
pub mod registry;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use agents::{
    Agent, CodeSandbox, ExecutionOutput, PolicyPredicate, ProcessSandbox, TerminationPredicate,
    ThinkingAgent,
};
pub use builder::{Pipeline, PipelineBuilder, RunOptions};
pub use context::{ExecutionContext, Interruption};
pub use marker::{Completion, CompletionPolicy, MarkerRule};
pub use outcome::{IncompleteReason, Outcome, OutcomeStatus};
pub use registry::{AgentRegistry, BuildEnv};
pub use session::{IterationRecord, IterationStatus, ReasoningSession, SessionRecorder};
