//! Registry-level settings

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::{CourierError, CourierResult};

/// Default cap on the number of cached limiters
pub const DEFAULT_MAX_CACHED_LIMITERS: usize = 1000;

/// Default idle time after which a limiter may be evicted
pub const DEFAULT_LIMITER_CACHE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Settings for the limiter registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Maximum number of limiters kept in memory
    #[serde(default = "default_max_cached_limiters")]
    pub max_cached_limiters: usize,

    /// Idle time after which a limiter is swept
    #[serde(default = "default_limiter_cache_timeout", with = "humantime_serde")]
    pub limiter_cache_timeout: Duration,
}

fn default_max_cached_limiters() -> usize {
    DEFAULT_MAX_CACHED_LIMITERS
}

fn default_limiter_cache_timeout() -> Duration {
    DEFAULT_LIMITER_CACHE_TIMEOUT
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            max_cached_limiters: DEFAULT_MAX_CACHED_LIMITERS,
            limiter_cache_timeout: DEFAULT_LIMITER_CACHE_TIMEOUT,
        }
    }
}

impl RegistrySettings {
    /// Load settings from `COURIER_MAX_CACHED_LIMITERS` and
    /// `COURIER_LIMITER_CACHE_TIMEOUT_MS`
    pub fn from_env() -> CourierResult<Self> {
        let mut settings = Self::default();

        if let Ok(val) = env::var("COURIER_MAX_CACHED_LIMITERS") {
            settings.max_cached_limiters = val.trim().parse().map_err(|_| {
                CourierError::config(format!("Invalid COURIER_MAX_CACHED_LIMITERS value '{}'", val))
            })?;
        }

        if let Ok(val) = env::var("COURIER_LIMITER_CACHE_TIMEOUT_MS") {
            let ms: u64 = val.trim().parse().map_err(|_| {
                CourierError::config(format!(
                    "Invalid COURIER_LIMITER_CACHE_TIMEOUT_MS value '{}'",
                    val
                ))
            })?;
            settings.limiter_cache_timeout = Duration::from_millis(ms);
        }

        Ok(settings.normalized())
    }

    /// Set the limiter cap
    pub fn with_max_cached_limiters(mut self, max: usize) -> Self {
        self.max_cached_limiters = max;
        self.normalized()
    }

    /// Set the idle timeout
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.limiter_cache_timeout = timeout;
        self.normalized()
    }

    /// Period of the background sweep (half the idle timeout)
    pub fn sweep_interval(&self) -> Duration {
        (self.limiter_cache_timeout / 2).max(Duration::from_millis(1))
    }

    fn normalized(mut self) -> Self {
        self.max_cached_limiters = self.max_cached_limiters.max(1);
        self
    }
}
