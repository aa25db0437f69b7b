//! Lifecycle events for rate-limited calls
//!
//! Components report what happens to a call (queued, executing, limited,
//! retry, failed) through an injected [`RateLimitSink`]. Sinks are
//! fire-and-forget: recording never blocks and never fails.

mod sinks;

pub use sinks::{BroadcastSink, MemorySink, NoopSink, TracingSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::Provider;

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Task appended to a limiter queue and not admitted immediately
    Queued,
    /// Task admitted and started
    Executing,
    /// Reservoir depleted, or the provider answered with a rate limit
    Limited,
    /// A failed attempt will be retried after a delay
    Retry,
    /// The call failed terminally
    Failed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Queued => "queued",
            EventKind::Executing => "executing",
            EventKind::Limited => "limited",
            EventKind::Retry => "retry",
            EventKind::Failed => "failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured event emitted to a [`RateLimitSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub resource_key: String,
    pub provider: Provider,
    pub operation: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_size: Option<usize>,
}

impl RateLimitEvent {
    /// Create an event stamped with the current time
    pub fn new(
        kind: EventKind,
        resource_key: impl Into<String>,
        provider: Provider,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            resource_key: resource_key.into(),
            provider,
            operation: operation.into(),
            timestamp: Utc::now(),
            retry_count: None,
            retry_after_ms: None,
            queue_size: None,
        }
    }

    /// Attach the retry attempt number
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    /// Attach a delay in milliseconds
    pub fn with_retry_after_ms(mut self, retry_after_ms: u64) -> Self {
        self.retry_after_ms = Some(retry_after_ms);
        self
    }

    /// Attach the queue length at emission time
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = Some(queue_size);
        self
    }
}

/// Receiver of rate limit lifecycle events
pub trait RateLimitSink: Send + Sync {
    /// Record one event. Must not block.
    fn record(&self, event: RateLimitEvent);
}

impl<S: RateLimitSink + ?Sized> RateLimitSink for Arc<S> {
    fn record(&self, event: RateLimitEvent) {
        (**self).record(event)
    }
}

/// Shared sink handle used throughout the crate
pub type SharedSink = Arc<dyn RateLimitSink>;
