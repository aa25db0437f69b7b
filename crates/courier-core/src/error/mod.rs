//! Error types for Courier
//!
//! Two families live here:
//! - [`CallError`]: the terminal outcome of a rate-limited provider call,
//!   wrapping the caller's own error type with classification metadata.
//! - [`CourierError`]: failures of this crate's own surfaces (settings parsing).

mod call;

pub use call::{CallError, FailureContext};

use thiserror::Error;

/// Result type alias for Courier's own operations
pub type CourierResult<T> = Result<T, CourierError>;

/// Errors raised by Courier itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CourierError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CourierError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = CourierError::config("Invalid COURIER_MAX_CACHED_LIMITERS value 'lots'");
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid COURIER_MAX_CACHED_LIMITERS value 'lots'"
        );
        assert!(matches!(error, CourierError::Config { .. }));
    }
}
