//! Reasoning engine implementations for LTM.
//!
//! - [`OpenAiCompatEngine`]: any OpenAI-compatible chat completions endpoint
//! - [`RetryingEngine`]: exponential backoff over retryable HTTP statuses

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatEngine;
pub use retry::RetryingEngine;
