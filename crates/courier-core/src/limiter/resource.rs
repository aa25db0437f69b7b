//! Admission-controlled scheduler for a single resource key

use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::ResourceKey;
use super::state::{LimiterState, Waiter, Wakeup};
use crate::config::{Provider, RateLimitConfig};
use crate::events::{EventKind, RateLimitEvent, SharedSink};

/// Read-only view of one limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimiterSnapshot {
    pub resource_key: ResourceKey,
    pub provider: Provider,
    pub running: u32,
    pub queued: usize,
    pub reservoir: u32,
    pub max_concurrent: u32,
    /// Time since the last reservoir reset
    #[serde(with = "humantime_serde")]
    pub since_refill: Duration,
}

struct LimiterCore {
    key: ResourceKey,
    config: RateLimitConfig,
    sink: SharedSink,
    /// Runtime the limiter was created on; wake-ups are spawned here when
    /// admission runs off-runtime (e.g. a guard dropped on a plain thread)
    runtime: Option<Handle>,
    state: Mutex<LimiterState>,
}

/// FIFO scheduler bound to one resource key.
///
/// A queued task starts only when all three constraints hold:
/// `running < max_concurrent`, `reservoir > 0` and at least `min_time` has
/// passed since the previous start. The reservoir is reset to the refresh
/// amount on every refresh tick.
pub struct ResourceLimiter {
    core: Arc<LimiterCore>,
}

/// Proof of admission. Holding it occupies one concurrency slot; dropping it
/// frees the slot and lets the next queued task in.
pub struct AdmissionGuard {
    core: Arc<LimiterCore>,
}

/// Removes a still-queued waiter when the caller stops waiting
struct PendingTicket {
    core: Arc<LimiterCore>,
    ticket: u64,
    armed: bool,
}

impl ResourceLimiter {
    /// Create a limiter with a full reservoir and nothing running
    pub fn new(key: impl Into<ResourceKey>, config: RateLimitConfig, sink: SharedSink) -> Self {
        let config = config.normalized();
        let state = LimiterState::new(&config, Instant::now());
        Self {
            core: Arc::new(LimiterCore {
                key: key.into(),
                config,
                sink,
                runtime: Handle::try_current().ok(),
                state: Mutex::new(state),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.core.key
    }

    pub fn provider(&self) -> Provider {
        self.core.config.provider
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.core.config
    }

    /// Run `task` once it is admitted and return its output.
    ///
    /// Tasks are admitted strictly in scheduling order. Dropping the returned
    /// future before admission removes the task from the queue without
    /// touching any counter.
    pub async fn schedule<T, F, Fut>(&self, operation: &str, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire(operation).await;
        task().await
    }

    /// Wait for admission and return the guard holding the running slot
    pub async fn acquire(&self, operation: &str) -> AdmissionGuard {
        loop {
            let (tx, rx) = oneshot::channel();
            let mut pending = LimiterCore::enqueue(&self.core, operation, tx);
            let admitted = rx.await;
            pending.armed = false;
            if let Ok(guard) = admitted {
                return guard;
            }
        }
    }

    /// Record an access for eviction bookkeeping
    pub fn touch(&self) {
        self.core.state.lock().last_accessed_at = Instant::now();
    }

    /// Time since the last access
    pub fn idle_for(&self) -> Duration {
        self.core.state.lock().last_accessed_at.elapsed()
    }

    pub fn is_idle(&self) -> bool {
        self.core.state.lock().is_idle()
    }

    pub fn running(&self) -> u32 {
        self.core.state.lock().running
    }

    pub fn queued(&self) -> usize {
        self.core.state.lock().queue.len()
    }

    /// Diagnostic view; does not apply pending refills
    pub fn snapshot(&self) -> LimiterSnapshot {
        let state = self.core.state.lock();
        let now = Instant::now();
        LimiterSnapshot {
            resource_key: self.core.key.clone(),
            provider: self.core.config.provider,
            running: state.running,
            queued: state.queue.len(),
            reservoir: state.effective_reservoir(&self.core.config, now),
            max_concurrent: self.core.config.max_concurrent,
            since_refill: now.saturating_duration_since(state.last_refill_at),
        }
    }

    /// Retire the limiter after eviction.
    ///
    /// A pending wake-up timer is cancelled when nothing is queued or
    /// running. Work already queued still drains.
    pub fn stop(&self) {
        let mut state = self.core.state.lock();
        state.retired = true;
        if state.is_idle() {
            if let Some(wakeup) = state.wakeup.take() {
                wakeup.handle.abort();
            }
        }
    }

    pub fn is_retired(&self) -> bool {
        self.core.state.lock().retired
    }
}

impl std::fmt::Debug for ResourceLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLimiter")
            .field("key", &self.core.key)
            .field("provider", &self.core.config.provider)
            .finish()
    }
}

impl Drop for ResourceLimiter {
    fn drop(&mut self) {
        // In-flight guards keep the core alive; only cancel when nothing waits
        let mut state = self.core.state.lock();
        if state.is_idle() {
            if let Some(wakeup) = state.wakeup.take() {
                wakeup.handle.abort();
            }
        }
    }
}

impl LimiterCore {
    fn event(&self, kind: EventKind, operation: &str) -> RateLimitEvent {
        RateLimitEvent::new(kind, self.key.clone(), self.config.provider, operation)
    }

    fn enqueue(
        core: &Arc<Self>,
        operation: &str,
        admit: oneshot::Sender<AdmissionGuard>,
    ) -> PendingTicket {
        let ticket = {
            let mut state = core.state.lock();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.queue.push_back(Waiter {
                ticket,
                operation: operation.to_string(),
                admit,
            });
            ticket
        };

        Self::pump(core);

        let queue_size = {
            let state = core.state.lock();
            state.position(ticket).map(|_| state.queue.len())
        };
        if let Some(queue_size) = queue_size {
            core.sink
                .record(core.event(EventKind::Queued, operation).with_queue_size(queue_size));
        }

        PendingTicket {
            core: core.clone(),
            ticket,
            armed: true,
        }
    }

    /// Admission check: start queued tasks from the head while all three
    /// constraints hold.
    fn pump(core: &Arc<Self>) {
        let mut admitted = Vec::new();
        let mut events = Vec::new();

        {
            let mut guard = core.state.lock();
            let state = &mut *guard;
            let now = Instant::now();
            state.refill_if_due(&core.config, now);

            loop {
                state.discard_cancelled_head();
                let Some(head) = state.queue.front() else {
                    break;
                };

                if state.running >= core.config.max_concurrent {
                    break;
                }

                if state.reservoir == 0 {
                    if !state.depletion_reported {
                        events.push(
                            core.event(EventKind::Limited, &head.operation)
                                .with_queue_size(state.queue.len()),
                        );
                        state.depletion_reported = true;
                    }
                    let at = state.next_refill_at(&core.config);
                    Self::arm_wakeup(core, state, at);
                    break;
                }

                if let Some(ready_at) = state.spacing_ready_at(core.config.min_time) {
                    if now < ready_at {
                        Self::arm_wakeup(core, state, ready_at);
                        break;
                    }
                }

                let Some(waiter) = state.queue.pop_front() else {
                    break;
                };
                state.running += 1;
                state.reservoir -= 1;
                state.last_started_at = Some(now);
                events.push(core.event(EventKind::Executing, &waiter.operation));
                admitted.push(waiter);
            }
        }

        for event in events {
            core.sink.record(event);
        }

        // Sent outside the lock: a failed send drops the guard, which re-locks
        for waiter in admitted {
            let guard = AdmissionGuard { core: core.clone() };
            if waiter.admit.send(guard).is_err() {
                tracing::trace!(
                    resource_key = %core.key,
                    operation = %waiter.operation,
                    "caller went away at admission"
                );
            }
        }
    }

    fn arm_wakeup(core: &Arc<Self>, state: &mut LimiterState, at: Instant) {
        if let Some(wakeup) = &state.wakeup {
            if wakeup.at <= at {
                return;
            }
        }
        if let Some(previous) = state.wakeup.take() {
            previous.handle.abort();
        }

        let Some(runtime) = Handle::try_current().ok().or_else(|| core.runtime.clone()) else {
            tracing::warn!(
                resource_key = %core.key,
                queued = state.queue.len(),
                "no tokio runtime to arm limiter wake-up, queued work waits for the next admission check"
            );
            return;
        };

        let id = state.next_wakeup_id;
        state.next_wakeup_id += 1;
        let weak: Weak<Self> = Arc::downgrade(core);
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(at).await;
            if let Some(core) = weak.upgrade() {
                {
                    let mut state = core.state.lock();
                    if state.wakeup.as_ref().is_some_and(|w| w.id == id) {
                        state.wakeup = None;
                    }
                }
                LimiterCore::pump(&core);
            }
        });

        state.wakeup = Some(Wakeup {
            at,
            id,
            handle: task.abort_handle(),
        });
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        {
            let mut state = self.core.state.lock();
            state.running = state.running.saturating_sub(1);
        }
        LimiterCore::pump(&self.core);
    }
}

impl Drop for PendingTicket {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.core.state.lock();
        if let Some(index) = state.position(self.ticket) {
            state.queue.remove(index);
            tracing::debug!(
                resource_key = %self.core.key,
                ticket = self.ticket,
                "queued task cancelled before admission"
            );
        }
    }
}
