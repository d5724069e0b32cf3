//! Retry wrapper: re-issues a failed engine call with exponential backoff.
//!
//! Only failures whose HTTP status is listed in the retry options are
//! retried. Without a `retry_options` section no wrapper is installed and
//! every request is sent exactly once.

use async_trait::async_trait;
use ltm_config::RetryOptions;
use ltm_core::engine::{EngineRequest, EngineResponse, ReasoningEngine};
use ltm_core::error::ReasoningEngineError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const MAX_DELAY: Duration = Duration::from_secs(60);

/// An engine that retries its inner engine on retryable statuses.
pub struct RetryingEngine {
    inner: Arc<dyn ReasoningEngine>,
    options: RetryOptions,
}

impl RetryingEngine {
    pub fn new(inner: Arc<dyn ReasoningEngine>, options: RetryOptions) -> Self {
        Self { inner, options }
    }

    /// Wrap `inner` only when retry options are configured.
    pub fn wrap(inner: Arc<dyn ReasoningEngine>, options: Option<&RetryOptions>) -> Arc<dyn ReasoningEngine> {
        match options {
            Some(options) if options.attempts > 1 => Arc::new(Self::new(inner, options.clone())),
            _ => inner,
        }
    }

    fn is_retryable(&self, error: &ReasoningEngineError) -> bool {
        error
            .status_code()
            .is_some_and(|code| self.options.http_status_codes.contains(&code))
    }

    /// Delay before retry number `retry` (1-based).
    fn delay(&self, retry: u32) -> Duration {
        let factor = self.options.exp_base.powi(retry.saturating_sub(1) as i32);
        let secs = self.options.initial_delay * factor;
        if !secs.is_finite() || secs >= MAX_DELAY.as_secs_f64() {
            return MAX_DELAY;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

#[async_trait]
impl ReasoningEngine for RetryingEngine {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(
        &self,
        request: EngineRequest,
    ) -> std::result::Result<EngineResponse, ReasoningEngineError> {
        let attempts = self.options.attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.generate(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < attempts && self.is_retryable(&e) => {
                    let delay = self.delay(attempt);
                    warn!(
                        engine = %self.inner.name(),
                        attempt,
                        total = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Engine call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        info!(engine = %self.inner.name(), attempt, "Giving up on engine call");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ltm_core::message::Message;
    use std::sync::Mutex;

    /// Fails with the scripted errors in order, then succeeds.
    struct FlakyEngine {
        failures: Mutex<Vec<ReasoningEngineError>>,
        call_count: Mutex<usize>,
    }

    impl FlakyEngine {
        fn new(mut failures: Vec<ReasoningEngineError>) -> Self {
            failures.reverse();
            Self {
                failures: Mutex::new(failures),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReasoningEngine for FlakyEngine {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(
            &self,
            _request: EngineRequest,
        ) -> std::result::Result<EngineResponse, ReasoningEngineError> {
            *self.call_count.lock().unwrap() += 1;
            match self.failures.lock().unwrap().pop() {
                Some(e) => Err(e),
                None => Ok(EngineResponse::text("test-model", "success")),
            }
        }
    }

    fn request() -> EngineRequest {
        EngineRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            temperature: None,
            max_tokens: None,
            tools: vec![],
        }
    }

    fn unavailable() -> ReasoningEngineError {
        ReasoningEngineError::ApiError {
            status_code: 503,
            message: "unavailable".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_status_then_succeeds() {
        let inner = Arc::new(FlakyEngine::new(vec![unavailable(), unavailable()]));
        let engine = RetryingEngine::new(inner.clone(), RetryOptions::default());
        let resp = engine.generate(request()).await.unwrap();
        assert_eq!(resp.text, "success");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_is_returned_at_once() {
        let inner = Arc::new(FlakyEngine::new(vec![ReasoningEngineError::AuthenticationFailed(
            "bad key".into(),
        )]));
        let engine = RetryingEngine::new(inner.clone(), RetryOptions::default());
        let err = engine.generate(request()).await.unwrap_err();
        assert!(matches!(err, ReasoningEngineError::AuthenticationFailed(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_configured_attempts() {
        let inner = Arc::new(FlakyEngine::new(vec![unavailable(); 5]));
        let options = RetryOptions {
            attempts: 2,
            ..RetryOptions::default()
        };
        let engine = RetryingEngine::new(inner.clone(), options);
        assert!(engine.generate(request()).await.is_err());
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn no_options_means_no_wrapper() {
        let inner = Arc::new(FlakyEngine::new(vec![unavailable()]));
        let engine = RetryingEngine::wrap(inner.clone(), None);
        assert!(engine.generate(request()).await.is_err());
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let engine = RetryingEngine::new(
            Arc::new(FlakyEngine::new(vec![])),
            RetryOptions::default(),
        );
        assert_eq!(engine.delay(1), Duration::from_secs(1));
        assert_eq!(engine.delay(2), Duration::from_secs(7));
        assert_eq!(engine.delay(3), Duration::from_secs(49));
        assert_eq!(engine.delay(4), MAX_DELAY);
    }
}
