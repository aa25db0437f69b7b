//! Terminal errors of rate-limited provider calls

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::Provider;
use crate::retry::FailureClass;

/// Metadata attached to every terminal call failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureContext {
    /// Resource key the call was made for
    pub resource_key: String,
    /// Provider resolved for the resource key
    pub provider: Provider,
    /// Logical operation name, e.g. `messages.list`
    pub operation: String,
    /// Total attempts made, including the first
    pub attempts: u32,
    /// Server-supplied retry hint from the last failure, if any
    pub retry_after: Option<Duration>,
}

/// Terminal failure of a call through the rate-limited client.
///
/// Intermediate failed attempts are never surfaced; only the final one is.
#[derive(Debug)]
pub enum CallError<E> {
    /// The error did not classify as retryable and was returned on first
    /// occurrence without consuming a retry
    NonRetryable { source: E, context: FailureContext },

    /// The error was retryable (rate limit or transient) but the retry
    /// budget ran out; wraps the last underlying error
    ExhaustedRetries {
        class: FailureClass,
        source: E,
        context: FailureContext,
    },
}

impl<E> CallError<E> {
    /// Classification of the final error
    pub fn class(&self) -> FailureClass {
        match self {
            Self::NonRetryable { .. } => FailureClass::NonRetryable,
            Self::ExhaustedRetries { class, .. } => *class,
        }
    }

    /// Whether the final error was a provider rate limit
    pub fn is_rate_limit(&self) -> bool {
        self.class() == FailureClass::RateLimit
    }

    /// Whether the retry budget was exhausted
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::ExhaustedRetries { .. })
    }

    /// Failure metadata
    pub fn context(&self) -> &FailureContext {
        match self {
            Self::NonRetryable { context, .. } | Self::ExhaustedRetries { context, .. } => context,
        }
    }

    /// Total attempts made
    pub fn attempts(&self) -> u32 {
        self.context().attempts
    }

    /// Server retry hint from the last failure
    pub fn retry_after(&self) -> Option<Duration> {
        self.context().retry_after
    }

    /// Borrow the underlying error
    pub fn inner(&self) -> &E {
        match self {
            Self::NonRetryable { source, .. } | Self::ExhaustedRetries { source, .. } => source,
        }
    }

    /// Take the underlying error
    pub fn into_inner(self) -> E {
        match self {
            Self::NonRetryable { source, .. } | Self::ExhaustedRetries { source, .. } => source,
        }
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonRetryable { source, context } => write!(
                f,
                "{} failed for {} ({}): {}",
                context.operation, context.resource_key, context.provider, source
            ),
            Self::ExhaustedRetries {
                class,
                source,
                context,
            } => write!(
                f,
                "{} failed for {} ({}) after {} attempts [{}]: {}",
                context.operation,
                context.resource_key,
                context.provider,
                context.attempts,
                class,
                source
            ),
        }
    }
}

impl<E> std::error::Error for CallError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner())
    }
}
