//! Per-resource admission control
//!
//! Each resource key (one account/grant) gets its own [`ResourceLimiter`]
//! enforcing three constraints at once: a concurrency cap, a minimum spacing
//! between starts, and a call reservoir that is reset on a fixed period.
//! Limiters are created lazily, cached and evicted by the [`LimiterRegistry`].

mod lookup;
mod registry;
mod resource;
mod state;


pub use lookup::{ProviderLookup, StaticProviderLookup};
pub use registry::{LimiterRegistry, RegistryStats};
pub use resource::{AdmissionGuard, LimiterSnapshot, ResourceLimiter};

#[cfg(test)]
pub(crate) use lookup::MockProviderLookup;

/// Opaque identifier of one independently rate-limited account/connection
pub type ResourceKey = String;
