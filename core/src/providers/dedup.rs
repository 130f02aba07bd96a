//! Duplicate-scan gate.
//!
//! QR scanners and manual re-taps fire the same token several times within
//! milliseconds. The gate collapses those into one effective attempt per
//! dedup window.
//!
//! # Implementation
//!
//! Use Redis `SET key value NX PX ttl` for a gate shared across instances.

use crate::error::Result;
use std::time::Duration;

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// This caller owns the token for the window
    Won,
    /// Someone else claimed it within the window
    Lost,
}

impl Claim {
    /// `true` for [`Claim::Won`].
    #[must_use]
    pub const fn is_won(self) -> bool {
        matches!(self, Self::Won)
    }
}

/// Short-TTL set-if-absent primitive over a shared cache.
///
/// Exactly one concurrent caller per key and window receives [`Claim::Won`].
/// Losers return immediately; this is a gate, not a queue. Entries are never
/// deleted explicitly, they lapse with the TTL.
pub trait DedupGate: Send + Sync {
    /// Try to claim `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns error if the cache is unreachable or the call times out.
    /// Callers must reject the scan rather than bypass the gate.
    fn try_claim(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<Claim>> + Send;
}
