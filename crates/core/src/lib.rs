//! # LTM Core
//!
//! Domain types, traits, and error definitions for the LTM agent pipeline
//! runtime. This crate has **no framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here (reasoning engine, tools).
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted engines and closure tools
//! - Clean dependency graph (all crates depend inward on core)

pub mod engine;
pub mod error;
pub mod event;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use engine::{EngineRequest, EngineResponse, ReasoningEngine, ToolDefinition, Usage};
pub use error::{
    CyclicDependencyError, PipelineBuildError, ReasoningEngineError, ToolError, ToolResolutionError,
};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use tool::{AsyncTool, FnTool, InvocationMode, SyncTool, ToolHandle};
