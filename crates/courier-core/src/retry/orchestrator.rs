//! Retry state machine driving the attempts of one call

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::backoff::compute_delay;
use super::{FailureClass, ProviderFailure, classify};
use crate::config::{Provider, RateLimitConfig};
use crate::error::{CallError, FailureContext};
use crate::events::{EventKind, RateLimitEvent, SharedSink};

/// Drives one logical call through `Attempting(n)` until it succeeds, fails
/// with a non-retryable error or runs out of retries.
///
/// The orchestrator never schedules anything itself: each attempt is
/// produced by the caller-supplied closure, which is expected to re-enter
/// admission control so a retry queues behind already waiting work.
#[derive(Clone)]
pub struct RetryOrchestrator {
    config: RateLimitConfig,
    sink: SharedSink,
    resource_key: String,
    operation: String,
}

impl RetryOrchestrator {
    pub fn new(config: RateLimitConfig, sink: SharedSink) -> Self {
        Self {
            config,
            sink,
            resource_key: String::new(),
            operation: String::new(),
        }
    }

    /// Bind the orchestrator to one resource key and operation
    pub fn for_call(mut self, resource_key: impl Into<String>, operation: impl Into<String>) -> Self {
        self.resource_key = resource_key.into();
        self.operation = operation.into();
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn provider(&self) -> Provider {
        self.config.provider
    }

    /// Run attempts until a terminal outcome.
    ///
    /// `attempt` receives the 0-based attempt number. At most
    /// `max_retries + 1` attempts are made.
    pub async fn run<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, CallError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProviderFailure,
    {
        let mut attempt_number = 0u32;

        loop {
            let error = match attempt(attempt_number).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let class = classify(&error);
            let hint = error.retry_after();

            if !class.is_retryable() {
                self.report_failure(class, attempt_number);
                return Err(CallError::NonRetryable {
                    source: error,
                    context: self.context(attempt_number + 1, hint),
                });
            }

            if attempt_number >= self.config.max_retries {
                self.report_failure(class, attempt_number);
                return Err(CallError::ExhaustedRetries {
                    class,
                    source: error,
                    context: self.context(attempt_number + 1, hint),
                });
            }

            let delay = compute_delay(&self.config, attempt_number, hint);
            let delay_ms = delay.as_millis() as u64;
            attempt_number += 1;

            if class == FailureClass::RateLimit {
                self.sink.record(
                    self.event(EventKind::Limited)
                        .with_retry_count(attempt_number)
                        .with_retry_after_ms(delay_ms),
                );
            }
            self.sink.record(
                self.event(EventKind::Retry)
                    .with_retry_count(attempt_number)
                    .with_retry_after_ms(delay_ms),
            );
            tracing::trace!(
                resource_key = %self.resource_key,
                operation = %self.operation,
                class = %class,
                attempt = attempt_number,
                delay_ms,
                hinted = hint.is_some(),
                "backing off"
            );

            sleep(delay).await;
        }
    }

    fn event(&self, kind: EventKind) -> RateLimitEvent {
        RateLimitEvent::new(
            kind,
            self.resource_key.clone(),
            self.config.provider,
            self.operation.clone(),
        )
    }

    fn report_failure(&self, class: FailureClass, retries: u32) {
        tracing::debug!(
            resource_key = %self.resource_key,
            operation = %self.operation,
            class = %class,
            retries,
            "call failed terminally"
        );
        self.sink
            .record(self.event(EventKind::Failed).with_retry_count(retries));
    }

    fn context(&self, attempts: u32, retry_after: Option<Duration>) -> FailureContext {
        FailureContext {
            resource_key: self.resource_key.clone(),
            provider: self.config.provider,
            operation: self.operation.clone(),
            attempts,
            retry_after,
        }
    }
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("resource_key", &self.resource_key)
            .field("operation", &self.operation)
            .field("provider", &self.config.provider)
            .field("max_retries", &self.config.max_retries)
            .finish()
    }
}
