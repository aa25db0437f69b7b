//! Key/value sources for per-provider limit overrides

use std::collections::HashMap;
use std::env;

use super::Provider;

/// Prefix shared by every override key
pub const OVERRIDE_PREFIX: &str = "COURIER_RATE_LIMIT";

/// Build the override key for a provider field, e.g.
/// `COURIER_RATE_LIMIT_GMAIL_MAX_CONCURRENT`
pub fn override_key(provider: Provider, field: &str) -> String {
    format!("{}_{}_{}", OVERRIDE_PREFIX, provider.env_segment(), field)
}

/// Source of raw override values, read once at resolution time
pub trait OverrideSource: Send + Sync {
    /// Look up a raw value by key
    fn get(&self, key: &str) -> Option<String>;
}

/// Overrides read from process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvOverrides;

impl OverrideSource for EnvOverrides {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl OverrideSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}
