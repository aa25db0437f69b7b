//! Resource key to provider lookup

use async_trait::async_trait;
use std::collections::HashMap;

/// Read-through lookup of the provider serving a resource key.
///
/// Implementations typically hit the account store. Failures are tolerated:
/// the registry falls back to the `other` provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderLookup: Send + Sync {
    async fn lookup_provider(&self, resource_key: &str) -> anyhow::Result<String>;
}

/// Lookup backed by a fixed map, with an optional default provider
#[derive(Debug, Clone, Default)]
pub struct StaticProviderLookup {
    providers: HashMap<String, String>,
    default_provider: Option<String>,
}

impl StaticProviderLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key resolves to `provider`
    pub fn uniform(provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: Some(provider.into()),
        }
    }

    /// Map one key to a provider
    pub fn with(mut self, resource_key: impl Into<String>, provider: impl Into<String>) -> Self {
        self.providers.insert(resource_key.into(), provider.into());
        self
    }

    pub fn insert(&mut self, resource_key: impl Into<String>, provider: impl Into<String>) {
        self.providers.insert(resource_key.into(), provider.into());
    }
}

#[async_trait]
impl ProviderLookup for StaticProviderLookup {
    async fn lookup_provider(&self, resource_key: &str) -> anyhow::Result<String> {
        self.providers
            .get(resource_key)
            .or(self.default_provider.as_ref())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no provider known for resource key '{}'", resource_key))
    }
}
