//! Backoff delays between retry attempts

use rand::Rng;
use std::time::Duration;

use crate::config::RateLimitConfig;

/// Upper bound of the random jitter added to computed delays
pub const JITTER_CEILING: Duration = Duration::from_millis(1000);

/// Exponential delay before jitter: `min(initial * 2^attempt, max)`.
///
/// `attempt` is 0-indexed: attempt 0 is the delay before the first retry.
pub fn base_delay(config: &RateLimitConfig, attempt: u32) -> Duration {
    exponential(config, attempt).min(config.max_retry_delay)
}

/// Delay before retrying after `attempt` failed.
///
/// A server hint wins and is only capped. Otherwise the exponential delay
/// gets up to one second of random jitter before capping.
pub fn compute_delay(config: &RateLimitConfig, attempt: u32, hint: Option<Duration>) -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..=JITTER_CEILING.as_millis() as u64);
    compute_delay_with_jitter(config, attempt, hint, Duration::from_millis(jitter_ms))
}

/// [`compute_delay`] with a caller-chosen jitter
pub fn compute_delay_with_jitter(
    config: &RateLimitConfig,
    attempt: u32,
    hint: Option<Duration>,
    jitter: Duration,
) -> Duration {
    match hint {
        Some(hint) => hint.min(config.max_retry_delay),
        None => exponential(config, attempt)
            .saturating_add(jitter)
            .min(config.max_retry_delay),
    }
}

fn exponential(config: &RateLimitConfig, attempt: u32) -> Duration {
    match 1u32.checked_shl(attempt) {
        Some(factor) => config.initial_retry_delay.saturating_mul(factor),
        None => Duration::MAX,
    }
}
