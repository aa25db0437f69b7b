//! Builder for [`RateLimitedClient`]

use std::sync::Arc;

use super::types::RateLimitedClient;
use crate::config::{EnvOverrides, OverrideSource, RegistrySettings};
use crate::events::{RateLimitSink, SharedSink, TracingSink};
use crate::limiter::{LimiterRegistry, ProviderLookup, StaticProviderLookup};

/// Configures the collaborators of a [`RateLimitedClient`].
///
/// Defaults: every key resolves to the `other` provider, overrides come from
/// the environment, events go to [`TracingSink`] and the registry uses
/// [`RegistrySettings::default`].
#[derive(Default)]
pub struct RateLimitedClientBuilder {
    lookup: Option<Arc<dyn ProviderLookup>>,
    overrides: Option<Arc<dyn OverrideSource>>,
    sink: Option<SharedSink>,
    settings: Option<RegistrySettings>,
}

impl RateLimitedClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resource key to provider lookup
    pub fn with_lookup(mut self, lookup: Arc<dyn ProviderLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Set the source of per-provider limit overrides
    pub fn with_overrides(mut self, overrides: Arc<dyn OverrideSource>) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Set the event sink
    pub fn with_sink<S: RateLimitSink + 'static>(mut self, sink: Arc<S>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the registry cache settings
    pub fn with_settings(mut self, settings: RegistrySettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Build the client. Must be called inside a tokio runtime.
    pub fn build(self) -> RateLimitedClient {
        let lookup = self
            .lookup
            .unwrap_or_else(|| Arc::new(StaticProviderLookup::uniform("other")));
        let overrides = self.overrides.unwrap_or_else(|| Arc::new(EnvOverrides));
        let sink: SharedSink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let settings = self.settings.unwrap_or_default();

        tracing::debug!(
            max_cached_limiters = settings.max_cached_limiters,
            limiter_cache_timeout_ms = settings.limiter_cache_timeout.as_millis() as u64,
            "building rate limited client"
        );

        RateLimitedClient {
            registry: LimiterRegistry::with_overrides(lookup, overrides, settings, sink.clone()),
            sink,
        }
    }
}
