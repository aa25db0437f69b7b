//! Built-in event sinks

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

use super::{EventKind, RateLimitEvent, RateLimitSink};

/// Sink that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl RateLimitSink for TracingSink {
    fn record(&self, event: RateLimitEvent) {
        match event.kind {
            EventKind::Queued => tracing::debug!(
                resource_key = %event.resource_key,
                provider = %event.provider,
                operation = %event.operation,
                queue_size = event.queue_size,
                "call queued"
            ),
            EventKind::Executing => tracing::debug!(
                resource_key = %event.resource_key,
                provider = %event.provider,
                operation = %event.operation,
                "call executing"
            ),
            EventKind::Limited => tracing::warn!(
                resource_key = %event.resource_key,
                provider = %event.provider,
                operation = %event.operation,
                queue_size = event.queue_size,
                retry_after_ms = event.retry_after_ms,
                "rate limited"
            ),
            EventKind::Retry => tracing::warn!(
                resource_key = %event.resource_key,
                provider = %event.provider,
                operation = %event.operation,
                attempt = event.retry_count,
                delay_ms = event.retry_after_ms,
                "retrying call"
            ),
            EventKind::Failed => tracing::error!(
                resource_key = %event.resource_key,
                provider = %event.provider,
                operation = %event.operation,
                retries = event.retry_count,
                "call failed"
            ),
        }
    }
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl RateLimitSink for NoopSink {
    fn record(&self, _event: RateLimitEvent) {}
}

/// Sink that fans events out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<RateLimitEvent>,
}

impl BroadcastSink {
    /// Create a sink with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RateLimitEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl RateLimitSink for BroadcastSink {
    fn record(&self, event: RateLimitEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RateLimitEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all recorded events, oldest first
    pub fn events(&self) -> Vec<RateLimitEvent> {
        self.events.lock().clone()
    }

    /// Recorded events of one kind
    pub fn of_kind(&self, kind: EventKind) -> Vec<RateLimitEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Event counts per kind
    pub fn counts(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in self.events.lock().iter() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl RateLimitSink for MemorySink {
    fn record(&self, event: RateLimitEvent) {
        self.events.lock().push(event);
    }
}
