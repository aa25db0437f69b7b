//! Classification-aware retry for provider calls
//!
//! A failed attempt is classified as a provider rate limit, a transient
//! failure or a non-retryable error. Retryable failures are retried with
//! capped, jittered exponential backoff, honoring any server retry hint.

mod backoff;
mod orchestrator;


pub use backoff::{JITTER_CEILING, base_delay, compute_delay, compute_delay_with_jitter};
pub use orchestrator::RetryOrchestrator;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::time::Duration;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The provider signalled a rate limit (HTTP 429 or equivalent)
    RateLimit,
    /// Gateway errors and dropped connections
    Transient,
    /// Anything else; surfaced immediately
    NonRetryable,
}

impl FailureClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureClass::NonRetryable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::RateLimit => "rate_limit",
            FailureClass::Transient => "transient",
            FailureClass::NonRetryable => "non_retryable",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-level failure reported by the underlying client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailure {
    ConnectionReset,
    Timeout,
}

/// What the retry layer needs to know about a failed provider call.
///
/// Every accessor has a neutral default so error types only implement what
/// they can report.
pub trait ProviderFailure {
    /// HTTP status of the response, if one was received
    fn status(&self) -> Option<u16> {
        None
    }

    /// Provider-specific error code, e.g. `rate_limit_exceeded`
    fn code(&self) -> Option<&str> {
        None
    }

    /// Human-readable error message
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    /// Server-supplied hint for how long to wait before retrying
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// Transport failure, when the request never got a response
    fn transport(&self) -> Option<TransportFailure> {
        None
    }
}

const RATE_LIMIT_CODES: &[&str] = &["429", "rate_limit_exceeded", "too_many_requests"];
const RATE_LIMIT_PHRASES: &[&str] = &["rate limit", "too many requests"];
const TRANSIENT_STATUSES: &[u16] = &[502, 503, 504];

/// Classify a failed attempt. Rate limits take precedence over transient
/// failures.
pub fn classify<E: ProviderFailure + ?Sized>(error: &E) -> FailureClass {
    if error.status() == Some(429) {
        return FailureClass::RateLimit;
    }
    if let Some(code) = error.code() {
        let code = code.trim();
        if RATE_LIMIT_CODES.iter().any(|c| c.eq_ignore_ascii_case(code)) {
            return FailureClass::RateLimit;
        }
    }
    let message = error.message().to_lowercase();
    if RATE_LIMIT_PHRASES.iter().any(|p| message.contains(p)) {
        return FailureClass::RateLimit;
    }

    if error.status().is_some_and(|s| TRANSIENT_STATUSES.contains(&s)) {
        return FailureClass::Transient;
    }
    if error.transport().is_some() {
        return FailureClass::Transient;
    }

    FailureClass::NonRetryable
}

/// Plain provider error, for transports that do not carry their own type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiError {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
    pub retry_after: Option<Duration>,
    pub transport: Option<TransportFailure>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Error carrying an HTTP status
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Error for a request that never got a response
    pub fn transport(failure: TransportFailure, message: impl Into<String>) -> Self {
        Self {
            transport: Some(failure),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "HTTP {} ({}): {}", status, code, self.message),
            (Some(status), None) => write!(f, "HTTP {}: {}", status, self.message),
            (None, Some(code)) => write!(f, "{}: {}", code, self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl ProviderFailure for ApiError {
    fn status(&self) -> Option<u16> {
        self.status
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.message)
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    fn transport(&self) -> Option<TransportFailure> {
        self.transport
    }
}

impl ProviderFailure for io::Error {
    fn message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn transport(&self) -> Option<TransportFailure> {
        match self.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Some(TransportFailure::ConnectionReset),
            io::ErrorKind::TimedOut => Some(TransportFailure::Timeout),
            _ => None,
        }
    }
}

impl<E: ProviderFailure + ?Sized> ProviderFailure for Box<E> {
    fn status(&self) -> Option<u16> {
        (**self).status()
    }

    fn code(&self) -> Option<&str> {
        (**self).code()
    }

    fn message(&self) -> Cow<'_, str> {
        (**self).message()
    }

    fn retry_after(&self) -> Option<Duration> {
        (**self).retry_after()
    }

    fn transport(&self) -> Option<TransportFailure> {
        (**self).transport()
    }
}
