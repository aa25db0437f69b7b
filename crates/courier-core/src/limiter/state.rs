//! Mutable limiter state, guarded by the limiter's own mutex

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::resource::AdmissionGuard;
use crate::config::RateLimitConfig;

/// A scheduled task waiting for admission
pub(super) struct Waiter {
    pub ticket: u64,
    pub operation: String,
    pub admit: oneshot::Sender<AdmissionGuard>,
}

/// Armed one-shot timer that re-runs admission
pub(super) struct Wakeup {
    pub at: Instant,
    pub id: u64,
    pub handle: AbortHandle,
}

pub(super) struct LimiterState {
    pub running: u32,
    pub reservoir: u32,
    pub last_refill_at: Instant,
    pub last_started_at: Option<Instant>,
    pub last_accessed_at: Instant,
    pub queue: VecDeque<Waiter>,
    pub next_ticket: u64,
    pub wakeup: Option<Wakeup>,
    pub next_wakeup_id: u64,
    /// Set once a `limited` event was emitted for the current depletion
    pub depletion_reported: bool,
    pub retired: bool,
}

impl LimiterState {
    pub fn new(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            running: 0,
            reservoir: config.reservoir_size,
            last_refill_at: now,
            last_started_at: None,
            last_accessed_at: now,
            queue: VecDeque::new(),
            next_ticket: 0,
            wakeup: None,
            next_wakeup_id: 0,
            depletion_reported: false,
            retired: false,
        }
    }

    /// Instant of the next scheduled reservoir reset
    pub fn next_refill_at(&self, config: &RateLimitConfig) -> Instant {
        self.last_refill_at + config.reservoir_refresh_interval
    }

    /// Apply every refresh tick that has elapsed by `now`.
    ///
    /// Ticks fire on a fixed grid starting at creation. Each tick resets the
    /// reservoir to the refresh amount; it never adds to it.
    pub fn refill_if_due(&mut self, config: &RateLimitConfig, now: Instant) -> bool {
        let interval = config.reservoir_refresh_interval;
        if now < self.next_refill_at(config) {
            return false;
        }

        let elapsed = now.duration_since(self.last_refill_at);
        let periods = (elapsed.as_nanos() / interval.as_nanos().max(1)).min(u32::MAX as u128) as u32;
        self.last_refill_at += interval.saturating_mul(periods);
        self.reservoir = config.reservoir_refresh_amount;
        self.depletion_reported = false;
        true
    }

    /// Reservoir value as it would read at `now`, without applying the refill
    pub fn effective_reservoir(&self, config: &RateLimitConfig, now: Instant) -> u32 {
        if now >= self.next_refill_at(config) {
            config.reservoir_refresh_amount
        } else {
            self.reservoir
        }
    }

    /// Earliest instant the spacing constraint allows another start
    pub fn spacing_ready_at(&self, min_time: Duration) -> Option<Instant> {
        self.last_started_at.map(|last| last + min_time)
    }

    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.queue.is_empty()
    }

    pub fn position(&self, ticket: u64) -> Option<usize> {
        self.queue.iter().position(|w| w.ticket == ticket)
    }

    /// Drop waiters at the head whose caller has gone away
    pub fn discard_cancelled_head(&mut self) {
        while self.queue.front().is_some_and(|w| w.admit.is_closed()) {
            self.queue.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;

    fn config() -> RateLimitConfig {
        RateLimitConfig::builtin(Provider::Other)
            .with_reservoir(5, Duration::from_secs(10))
            .with_refresh_amount(3)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_resets_instead_of_adding() {
        let config = config();
        let mut state = LimiterState::new(&config, Instant::now());
        assert_eq!(state.reservoir, 5);

        state.reservoir = 2;
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(state.refill_if_due(&config, Instant::now()));
        assert_eq!(state.reservoir, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_stays_on_grid() {
        let config = config();
        let start = Instant::now();
        let mut state = LimiterState::new(&config, start);
        state.reservoir = 0;

        tokio::time::advance(Duration::from_secs(25)).await;
        assert!(state.refill_if_due(&config, Instant::now()));
        assert_eq!(state.last_refill_at, start + Duration::from_secs(20));
        assert_eq!(state.next_refill_at(&config), start + Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_refill_before_tick() {
        let config = config();
        let mut state = LimiterState::new(&config, Instant::now());
        state.reservoir = 0;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!state.refill_if_due(&config, Instant::now()));
        assert_eq!(state.reservoir, 0);
        assert_eq!(state.effective_reservoir(&config, Instant::now()), 0);
    }
}
