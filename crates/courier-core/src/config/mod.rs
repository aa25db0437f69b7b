//! Configuration for per-provider limits and the limiter registry
//!
//! Provider limits are resolved from a built-in table and can be overridden
//! field by field through an [`OverrideSource`] (the process environment by
//! default). Resolution never fails: unknown providers fall back to
//! [`Provider::Other`] and malformed overrides fall back to the default.

mod limits;
mod overrides;
mod provider;
mod settings;

pub use limits::RateLimitConfig;
pub use overrides::{EnvOverrides, OverrideSource, override_key};
pub use provider::Provider;
pub use settings::RegistrySettings;
