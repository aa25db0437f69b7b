//! Rate-limited client type definitions

use crate::events::SharedSink;
use crate::limiter::LimiterRegistry;

/// Public façade for outbound provider calls.
///
/// Every call is scheduled on the [`ResourceLimiter`](crate::ResourceLimiter)
/// of its resource key and driven by a
/// [`RetryOrchestrator`](crate::RetryOrchestrator). Each retry re-enters
/// admission control like a fresh task.
///
/// # Examples
///
/// ```no_run
/// use courier_core::{ApiError, RateLimitedClient, ResourceKind, StaticProviderLookup};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RateLimitedClient::builder()
///     .with_lookup(Arc::new(StaticProviderLookup::uniform("gmail")))
///     .build();
///
/// let messages = client
///     .list("grant-42", ResourceKind::Messages, || async {
///         Ok::<_, ApiError>(vec!["msg-1".to_string()])
///     })
///     .await?;
/// assert_eq!(messages.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RateLimitedClient {
    pub(super) registry: LimiterRegistry,
    pub(super) sink: SharedSink,
}

impl std::fmt::Debug for RateLimitedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedClient")
            .field("registry", &self.registry)
            .finish()
    }
}
