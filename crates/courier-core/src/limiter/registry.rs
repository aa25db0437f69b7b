//! Registry owning one limiter per resource key
//!
//! The key -> limiter map is the only structure touched by several flows
//! (lookup, creation, sweep), so every mutation goes through a single mutex
//! around an LRU cache. The mutex is never held across an `.await`.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use super::lookup::ProviderLookup;
use super::resource::{LimiterSnapshot, ResourceLimiter};
use super::ResourceKey;
use crate::config::{EnvOverrides, OverrideSource, Provider, RateLimitConfig, RegistrySettings};
use crate::events::SharedSink;

/// Read-only registry snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    /// Number of cached limiters
    pub limiters: usize,
    /// Total tasks running across all limiters
    pub running: u32,
    /// Total tasks queued across all limiters
    pub queued: usize,
    /// Per-key details, most recently accessed first
    pub resources: Vec<LimiterSnapshot>,
}

struct RegistryInner {
    settings: RegistrySettings,
    lookup: Arc<dyn ProviderLookup>,
    overrides: Arc<dyn OverrideSource>,
    sink: SharedSink,
    limiters: Mutex<LruCache<ResourceKey, Arc<ResourceLimiter>>>,
    shutdown: CancellationToken,
}

/// Creates, caches and evicts [`ResourceLimiter`]s keyed by resource
#[derive(Clone)]
pub struct LimiterRegistry {
    inner: Arc<RegistryInner>,
}

impl LimiterRegistry {
    /// Create a registry reading overrides from the environment.
    ///
    /// Must be called inside a tokio runtime; the idle sweep starts
    /// immediately.
    pub fn new(lookup: Arc<dyn ProviderLookup>, settings: RegistrySettings, sink: SharedSink) -> Self {
        Self::with_overrides(lookup, Arc::new(EnvOverrides), settings, sink)
    }

    /// Create a registry with an explicit override source
    pub fn with_overrides(
        lookup: Arc<dyn ProviderLookup>,
        overrides: Arc<dyn OverrideSource>,
        settings: RegistrySettings,
        sink: SharedSink,
    ) -> Self {
        let inner = Arc::new(RegistryInner {
            settings,
            lookup,
            overrides,
            sink,
            limiters: Mutex::new(LruCache::unbounded()),
            shutdown: CancellationToken::new(),
        });
        Self::start_sweep_task(Arc::downgrade(&inner), inner.settings.clone(), inner.shutdown.clone());
        Self { inner }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.inner.settings
    }

    /// Return the live limiter for `key`, creating it on first use.
    ///
    /// Provider lookup failures fall back to [`Provider::Other`]; this never
    /// fails.
    pub async fn get_or_create(&self, key: &str) -> Arc<ResourceLimiter> {
        if let Some(limiter) = self.get(key) {
            return limiter;
        }

        let provider = self.resolve_provider(key).await;
        let config = RateLimitConfig::for_provider(provider, self.inner.overrides.as_ref());

        let mut evicted = Vec::new();
        let limiter = {
            let mut limiters = self.inner.limiters.lock();
            if let Some(existing) = limiters.get(key) {
                // Another flow created it while the lookup was in flight
                existing.touch();
                existing.clone()
            } else {
                let limiter = Arc::new(ResourceLimiter::new(
                    key,
                    config,
                    self.inner.sink.clone(),
                ));
                limiters.put(key.to_string(), limiter.clone());
                while limiters.len() > self.inner.settings.max_cached_limiters {
                    match limiters.pop_lru() {
                        Some(entry) => evicted.push(entry),
                        None => break,
                    }
                }
                tracing::debug!(
                    resource_key = %key,
                    provider = %provider,
                    cached = limiters.len(),
                    "created resource limiter"
                );
                limiter
            }
        };

        for (evicted_key, evicted_limiter) in evicted {
            evicted_limiter.stop();
            tracing::debug!(resource_key = %evicted_key, "evicted least recently used limiter");
        }

        limiter
    }

    /// Return the limiter for `key` if cached, refreshing its access time
    pub fn get(&self, key: &str) -> Option<Arc<ResourceLimiter>> {
        let mut limiters = self.inner.limiters.lock();
        let limiter = limiters.get(key)?;
        limiter.touch();
        Some(limiter.clone())
    }

    /// Whether a limiter is cached for `key`, without touching it
    pub fn contains(&self, key: &str) -> bool {
        self.inner.limiters.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.limiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every limiter idle for longer than the cache timeout.
    ///
    /// Returns the number removed.
    pub fn sweep_idle(&self) -> usize {
        Self::sweep(&self.inner)
    }

    fn sweep(inner: &RegistryInner) -> usize {
        let timeout = inner.settings.limiter_cache_timeout;
        let removed: Vec<(ResourceKey, Arc<ResourceLimiter>)> = {
            let mut limiters = inner.limiters.lock();
            let expired: Vec<ResourceKey> = limiters
                .iter()
                .filter(|(_, limiter)| limiter.idle_for() > timeout)
                .map(|(key, _)| key.clone())
                .collect();
            expired
                .into_iter()
                .filter_map(|key| limiters.pop(&key).map(|limiter| (key, limiter)))
                .collect()
        };

        for (key, limiter) in &removed {
            limiter.stop();
            tracing::debug!(resource_key = %key, "swept idle limiter");
        }
        removed.len()
    }

    /// Read-only snapshot; does not change access order
    pub fn stats(&self) -> RegistryStats {
        let limiters = self.inner.limiters.lock();
        let resources: Vec<LimiterSnapshot> =
            limiters.iter().map(|(_, limiter)| limiter.snapshot()).collect();
        RegistryStats {
            limiters: resources.len(),
            running: resources.iter().map(|r| r.running).sum(),
            queued: resources.iter().map(|r| r.queued).sum(),
            resources,
        }
    }

    /// Stop the sweep and retire every limiter
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let drained: Vec<Arc<ResourceLimiter>> = {
            let mut limiters = self.inner.limiters.lock();
            let mut drained = Vec::with_capacity(limiters.len());
            while let Some((_, limiter)) = limiters.pop_lru() {
                drained.push(limiter);
            }
            drained
        };
        for limiter in drained {
            limiter.stop();
        }
    }

    async fn resolve_provider(&self, key: &str) -> Provider {
        match self.inner.lookup.lookup_provider(key).await {
            Ok(name) => Provider::parse(&name),
            Err(error) => {
                tracing::warn!(
                    resource_key = %key,
                    error = %error,
                    "provider lookup failed, using default limits"
                );
                Provider::Other
            }
        }
    }

    fn start_sweep_task(
        inner: Weak<RegistryInner>,
        settings: RegistrySettings,
        shutdown: CancellationToken,
    ) {
        let period = settings.sweep_interval();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let removed = Self::sweep(&inner);
                if removed > 0 {
                    tracing::debug!(removed, "idle limiter sweep");
                }
            }
        });
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for LimiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimiterRegistry")
            .field("settings", &self.inner.settings)
            .field("limiters", &self.len())
            .finish()
    }
}
