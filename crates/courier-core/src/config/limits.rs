//! Per-provider rate limit configuration
//!
//! The built-in table reflects the quota each provider family enforces per
//! account. Any field can be overridden through an [`OverrideSource`] using
//! keys built by [`override_key`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::overrides::{OverrideSource, override_key};
use super::provider::Provider;

/// Resolved limits for one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Provider this configuration was resolved for
    pub provider: Provider,
    /// Maximum number of operations running at once
    pub max_concurrent: u32,
    /// Minimum spacing between successive operation starts
    #[serde(with = "humantime_serde")]
    pub min_time: Duration,
    /// Call budget (reservoir capacity)
    pub reservoir_size: u32,
    /// Value the reservoir is reset to on each refresh
    pub reservoir_refresh_amount: u32,
    /// Period of the reservoir refresh
    #[serde(with = "humantime_serde")]
    pub reservoir_refresh_interval: Duration,
    /// Retries allowed after the initial attempt
    pub max_retries: u32,
    /// Backoff delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_retry_delay: Duration,
    /// Upper bound for any single backoff delay
    #[serde(with = "humantime_serde")]
    pub max_retry_delay: Duration,
}

impl RateLimitConfig {
    /// Built-in limits for a provider, without overrides
    pub fn builtin(provider: Provider) -> Self {
        match provider {
            Provider::Gmail => Self::table(provider, 4, 100, 600, 60_000, 3, 1_000, 30_000),
            Provider::Outlook => Self::table(provider, 4, 150, 400, 60_000, 3, 1_000, 30_000),
            Provider::Yahoo => Self::table(provider, 2, 500, 100, 60_000, 3, 2_000, 60_000),
            Provider::ICloud => Self::table(provider, 2, 500, 100, 60_000, 3, 2_000, 60_000),
            Provider::Other => Self::table(provider, 2, 250, 200, 60_000, 3, 1_000, 30_000),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn table(
        provider: Provider,
        max_concurrent: u32,
        min_time_ms: u64,
        reservoir: u32,
        refresh_interval_ms: u64,
        max_retries: u32,
        initial_retry_delay_ms: u64,
        max_retry_delay_ms: u64,
    ) -> Self {
        Self {
            provider,
            max_concurrent,
            min_time: Duration::from_millis(min_time_ms),
            reservoir_size: reservoir,
            reservoir_refresh_amount: reservoir,
            reservoir_refresh_interval: Duration::from_millis(refresh_interval_ms),
            max_retries,
            initial_retry_delay: Duration::from_millis(initial_retry_delay_ms),
            max_retry_delay: Duration::from_millis(max_retry_delay_ms),
        }
    }

    /// Resolve the configuration for a provider name.
    ///
    /// The name is case-normalized and aliased; unknown names resolve to
    /// [`Provider::Other`]. Always succeeds.
    pub fn resolve(provider: &str, overrides: &dyn OverrideSource) -> Self {
        Self::for_provider(Provider::parse(provider), overrides)
    }

    /// Resolve the configuration for a typed provider
    pub fn for_provider(provider: Provider, overrides: &dyn OverrideSource) -> Self {
        let mut config = Self::builtin(provider);

        if let Some(v) = read_u64(overrides, provider, "MAX_CONCURRENT") {
            config.max_concurrent = clamp_u32(v);
        }
        if let Some(v) = read_u64(overrides, provider, "MIN_TIME_MS") {
            config.min_time = Duration::from_millis(v);
        }
        if let Some(v) = read_u64(overrides, provider, "RESERVOIR_SIZE") {
            config.reservoir_size = clamp_u32(v);
        }
        if let Some(v) = read_u64(overrides, provider, "RESERVOIR_REFRESH_AMOUNT") {
            config.reservoir_refresh_amount = clamp_u32(v);
        }
        if let Some(v) = read_u64(overrides, provider, "RESERVOIR_REFRESH_INTERVAL_MS") {
            config.reservoir_refresh_interval = Duration::from_millis(v);
        }
        if let Some(v) = read_u64(overrides, provider, "MAX_RETRIES") {
            config.max_retries = clamp_u32(v);
        }
        if let Some(v) = read_u64(overrides, provider, "INITIAL_RETRY_DELAY_MS") {
            config.initial_retry_delay = Duration::from_millis(v);
        }
        if let Some(v) = read_u64(overrides, provider, "MAX_RETRY_DELAY_MS") {
            config.max_retry_delay = Duration::from_millis(v);
        }

        config.normalized()
    }

    /// Enforce the field invariants after overrides have been applied
    pub fn normalized(mut self) -> Self {
        self.max_concurrent = self.max_concurrent.max(1);
        self.reservoir_size = self.reservoir_size.max(1);
        self.reservoir_refresh_amount = self.reservoir_refresh_amount.clamp(1, self.reservoir_size);
        self.reservoir_refresh_interval = self
            .reservoir_refresh_interval
            .max(Duration::from_millis(1));
        if self.initial_retry_delay > self.max_retry_delay {
            self.initial_retry_delay = self.max_retry_delay;
        }
        self
    }

    // ========== Builder methods ==========

    /// Set max concurrent operations
    pub fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent = max;
        self.normalized()
    }

    /// Set minimum spacing between starts
    pub fn with_min_time(mut self, min_time: Duration) -> Self {
        self.min_time = min_time;
        self
    }

    /// Set reservoir size and refresh amount together
    pub fn with_reservoir(mut self, size: u32, refresh_interval: Duration) -> Self {
        self.reservoir_size = size;
        self.reservoir_refresh_amount = size;
        self.reservoir_refresh_interval = refresh_interval;
        self.normalized()
    }

    /// Set the value the reservoir resets to
    pub fn with_refresh_amount(mut self, amount: u32) -> Self {
        self.reservoir_refresh_amount = amount;
        self.normalized()
    }

    /// Set retry parameters
    pub fn with_retries(mut self, max_retries: u32, initial: Duration, max: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_retry_delay = initial;
        self.max_retry_delay = max;
        self.normalized()
    }

    /// Worst-case time a caller can spend in backoff sleeps
    pub fn worst_case_backoff(&self) -> Duration {
        self.max_retry_delay.saturating_mul(self.max_retries)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::builtin(Provider::Other)
    }
}

fn read_u64(overrides: &dyn OverrideSource, provider: Provider, field: &str) -> Option<u64> {
    let key = override_key(provider, field);
    let raw = overrides.get(&key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(key = %key, value = %raw, "ignoring non-numeric rate limit override");
            None
        }
    }
}

fn clamp_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_gmail_defaults() {
        let config = RateLimitConfig::resolve("gmail", &HashMap::<String, String>::new());
        assert_eq!(config.provider, Provider::Gmail);
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.min_time, Duration::from_millis(100));
        assert_eq!(config.reservoir_size, 600);
        assert_eq!(config.reservoir_refresh_amount, 600);
        assert_eq!(config.reservoir_refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_provider_uses_other() {
        let config = RateLimitConfig::resolve("Zoho", &HashMap::<String, String>::new());
        assert_eq!(config, RateLimitConfig::builtin(Provider::Other));
    }

    #[test]
    fn test_resolve_normalizes_case_and_alias() {
        let config = RateLimitConfig::resolve(" Office365 ", &HashMap::<String, String>::new());
        assert_eq!(config.provider, Provider::Outlook);
    }

    #[test]
    fn test_override_applies_per_provider() {
        let source = overrides(&[
            ("COURIER_RATE_LIMIT_GMAIL_MAX_CONCURRENT", "8"),
            ("COURIER_RATE_LIMIT_GMAIL_MIN_TIME_MS", "50"),
            ("COURIER_RATE_LIMIT_OUTLOOK_MAX_CONCURRENT", "1"),
        ]);
        let gmail = RateLimitConfig::resolve("gmail", &source);
        assert_eq!(gmail.max_concurrent, 8);
        assert_eq!(gmail.min_time, Duration::from_millis(50));

        let yahoo = RateLimitConfig::resolve("yahoo", &source);
        assert_eq!(yahoo, RateLimitConfig::builtin(Provider::Yahoo));
    }

    #[test]
    fn test_non_numeric_override_falls_back() {
        let source = overrides(&[
            ("COURIER_RATE_LIMIT_GMAIL_RESERVOIR_SIZE", "lots"),
            ("COURIER_RATE_LIMIT_GMAIL_MAX_RETRIES", "-1"),
        ]);
        let config = RateLimitConfig::resolve("gmail", &source);
        assert_eq!(config.reservoir_size, 600);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_initial_delay_never_exceeds_max() {
        let source = overrides(&[
            ("COURIER_RATE_LIMIT_OTHER_INITIAL_RETRY_DELAY_MS", "90000"),
            ("COURIER_RATE_LIMIT_OTHER_MAX_RETRY_DELAY_MS", "5000"),
        ]);
        let config = RateLimitConfig::resolve("other", &source);
        assert_eq!(config.max_retry_delay, Duration::from_millis(5000));
        assert!(config.initial_retry_delay <= config.max_retry_delay);
    }

    #[test]
    fn test_zero_overrides_are_clamped() {
        let source = overrides(&[
            ("COURIER_RATE_LIMIT_ICLOUD_MAX_CONCURRENT", "0"),
            ("COURIER_RATE_LIMIT_ICLOUD_RESERVOIR_SIZE", "0"),
            ("COURIER_RATE_LIMIT_ICLOUD_RESERVOIR_REFRESH_AMOUNT", "500"),
        ]);
        let config = RateLimitConfig::resolve("icloud", &source);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.reservoir_size, 1);
        assert_eq!(config.reservoir_refresh_amount, 1);
    }

    #[test]
    fn test_worst_case_backoff() {
        let config = RateLimitConfig::builtin(Provider::Gmail);
        assert_eq!(config.worst_case_backoff(), Duration::from_secs(90));
    }

    #[test]
    fn test_config_serialization() {
        let config = RateLimitConfig::builtin(Provider::Gmail);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["provider"], "gmail");
        assert_eq!(json["min_time"], "100ms");

        let parsed: RateLimitConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config);
    }
}
