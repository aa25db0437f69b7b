//! Rate-limited call entry points

use parking_lot::Mutex;
use std::future::Future;
use tracing::instrument;

use super::builder::RateLimitedClientBuilder;
use super::operation::{Operation, ResourceKind};
use super::types::RateLimitedClient;
use crate::error::CallError;
use crate::limiter::{LimiterRegistry, RegistryStats};
use crate::retry::{ProviderFailure, RetryOrchestrator};

impl RateLimitedClient {
    pub fn builder() -> RateLimitedClientBuilder {
        RateLimitedClientBuilder::new()
    }

    pub fn registry(&self) -> &LimiterRegistry {
        &self.registry
    }

    /// Run `thunk` for `resource_key` under admission control and retry.
    ///
    /// Each attempt calls `thunk` again and is scheduled on the key's current
    /// limiter, so a retry queues behind work that is already waiting.
    /// Admission delays are invisible to the caller; only the terminal
    /// failure is surfaced.
    #[instrument(skip(self, operation, thunk), fields(operation = %operation))]
    pub async fn call<T, E, F, Fut>(
        &self,
        resource_key: &str,
        operation: Operation,
        thunk: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProviderFailure,
    {
        let limiter = self.registry.get_or_create(resource_key).await;
        let orchestrator = RetryOrchestrator::new(limiter.config().clone(), self.sink.clone())
            .for_call(resource_key, operation.as_str());
        drop(limiter);

        // Shared by every attempt; only an admitted task invokes it
        let thunk = Mutex::new(thunk);
        let thunk = &thunk;

        orchestrator
            .run(move |_attempt| {
                let registry = self.registry.clone();
                let resource_key = resource_key.to_string();
                let operation = operation.clone();
                async move {
                    let limiter = registry.get_or_create(&resource_key).await;
                    limiter
                        .schedule(operation.as_str(), || {
                            let mut thunk = thunk.lock();
                            (*thunk)()
                        })
                        .await
                }
            })
            .await
    }

    /// List resources of one kind
    pub async fn list<T, E, F, Fut>(
        &self,
        resource_key: &str,
        kind: ResourceKind,
        thunk: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProviderFailure,
    {
        self.call(resource_key, Operation::list(kind), thunk).await
    }

    /// Fetch a single resource
    pub async fn find<T, E, F, Fut>(
        &self,
        resource_key: &str,
        kind: ResourceKind,
        thunk: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProviderFailure,
    {
        self.call(resource_key, Operation::find(kind), thunk).await
    }

    pub async fn create<T, E, F, Fut>(
        &self,
        resource_key: &str,
        kind: ResourceKind,
        thunk: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProviderFailure,
    {
        self.call(resource_key, Operation::create(kind), thunk).await
    }

    pub async fn update<T, E, F, Fut>(
        &self,
        resource_key: &str,
        kind: ResourceKind,
        thunk: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProviderFailure,
    {
        self.call(resource_key, Operation::update(kind), thunk).await
    }

    pub async fn delete<T, E, F, Fut>(
        &self,
        resource_key: &str,
        kind: ResourceKind,
        thunk: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProviderFailure,
    {
        self.call(resource_key, Operation::delete(kind), thunk).await
    }

    /// Send a message; retried like any other call
    pub async fn send_message<T, E, F, Fut>(
        &self,
        resource_key: &str,
        thunk: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProviderFailure,
    {
        self.call(resource_key, Operation::send_message(), thunk).await
    }

    /// Run `thunk` with no limiting and no retry.
    ///
    /// Meant for identity and auth calls that must not wait behind queued
    /// work.
    pub async fn bypass<T, F, Fut>(&self, operation: Operation, thunk: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        tracing::trace!(operation = %operation, "bypassing rate limiter");
        thunk().await
    }

    /// Read-only snapshot of every cached limiter
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Stop the idle sweep and retire every limiter
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}
