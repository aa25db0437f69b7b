//! Courier Core Library
//!
//! Per-account admission control and retry orchestration for outbound calls to
//! an email/calendar provider API. Every call is funneled through a
//! [`RateLimitedClient`], which schedules it on the [`ResourceLimiter`] owned
//! by the account's resource key and drives it with a [`RetryOrchestrator`].
//!
//! ```text
//! caller ──► RateLimitedClient ──► LimiterRegistry ──► ResourceLimiter (FIFO, concurrency,
//!                   │                     │                spacing, reservoir)
//!                   │                     └── ProviderLookup (key -> provider)
//!                   └──► RetryOrchestrator (classify, back off, re-admit)
//!                               │
//!                               └──► RateLimitSink (queued/executing/limited/retry/failed)
//! ```

// Allow common clippy lints that are stylistic preferences
#![allow(clippy::collapsible_if)]
#![allow(clippy::type_complexity)]

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod retry;

// Re-export commonly used types
pub use client::{Operation, RateLimitedClient, RateLimitedClientBuilder, ResourceKind};
pub use config::{EnvOverrides, OverrideSource, Provider, RateLimitConfig, RegistrySettings};
pub use error::{CallError, CourierError, CourierResult, FailureContext};
pub use events::{EventKind, RateLimitEvent, RateLimitSink, TracingSink};
pub use limiter::{
    LimiterRegistry, LimiterSnapshot, ProviderLookup, RegistryStats, ResourceKey, ResourceLimiter,
    StaticProviderLookup,
};
pub use retry::{ApiError, FailureClass, ProviderFailure, RetryOrchestrator, TransportFailure};
