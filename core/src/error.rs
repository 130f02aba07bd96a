//! Error types for check-in, issuance and sweeping.
//!
//! Only transient and fatal failures are errors here. Business rejections
//! (not found, already claimed, duplicate scan, bad signature) are outcome
//! values on the success path, see [`crate::checkin`].

use std::time::Duration;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, EventPassError>;

/// Failure taxonomy for the check-in core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventPassError {
    // ═══════════════════════════════════════════════════════════
    // Transient I/O
    // ═══════════════════════════════════════════════════════════

    /// Database operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Shared cache (dedup gate) operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The call did not finish before its deadline. Outcome unknown.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Check-in event could not be published.
    #[error("Publish error: {0}")]
    Publish(String),

    // ═══════════════════════════════════════════════════════════
    // Configuration / fatal
    // ═══════════════════════════════════════════════════════════

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing key could not be initialised.
    #[error("Signature error: {0}")]
    Signature(String),
}

impl EventPassError {
    /// Returns `true` if the caller may retry the request.
    ///
    /// A retried check-in must re-resolve the ticket first: a timeout means
    /// the conditional write may or may not have landed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use eventpass_core::EventPassError;
    /// use std::time::Duration;
    /// assert!(EventPassError::Timeout(Duration::from_secs(1)).is_retryable());
    /// assert!(!EventPassError::Config("missing secret".into()).is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Cache(_) | Self::Timeout(_) | Self::Publish(_)
        )
    }
}
