//! Redis-backed dedup gate.
//!
//! # Algorithm
//!
//! `SET scan:dedup:{token} 1 NX PX {ttl_ms}`. Redis executes the command
//! atomically, so among concurrent callers exactly one gets `OK` back; the
//! rest get nil. The key expires on its own.

use eventpass_core::error::{EventPassError, Result};
use eventpass_core::providers::{Claim, DedupGate};
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Cluster-wide dedup gate.
///
/// # Example
///
/// ```no_run
/// use eventpass_core::providers::DedupGate;
/// use eventpass_redis::RedisDedupGate;
/// use std::time::Duration;
///
/// # async fn example() -> eventpass_core::Result<()> {
/// let gate = RedisDedupGate::new("redis://127.0.0.1:6379", Duration::from_secs(1)).await?;
///
/// if gate.try_claim("3f2a...", Duration::from_secs(5)).await?.is_won() {
///     // first scan in the window
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisDedupGate {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
    /// Deadline per command.
    command_timeout: Duration,
}

impl RedisDedupGate {
    /// Connect a gate to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns error if connection to `Redis` fails.
    pub async fn new(redis_url: &str, command_timeout: Duration) -> Result<Self> {
        Ok(Self::from_connection(
            crate::connect(redis_url).await?,
            command_timeout,
        ))
    }

    /// Build a gate on an existing connection manager.
    #[must_use]
    pub const fn from_connection(conn_manager: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            conn_manager,
            command_timeout,
        }
    }

    /// Get the `Redis` key for a scanned token.
    fn dedup_key(token: &str) -> String {
        format!("scan:dedup:{token}")
    }

    /// TTL in whole milliseconds, at least one.
    fn ttl_millis(ttl: Duration) -> u64 {
        u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
    }
}

impl DedupGate for RedisDedupGate {
    async fn try_claim(&self, key: &str, ttl: Duration) -> Result<Claim> {
        let mut conn = self.conn_manager.clone();
        let dedup_key = Self::dedup_key(key);

        let reply: Option<String> = tokio::time::timeout(
            self.command_timeout,
            redis::cmd("SET")
                .arg(&dedup_key)
                .arg(1)
                .arg("NX")
                .arg("PX")
                .arg(Self::ttl_millis(ttl))
                .query_async(&mut conn),
        )
        .await
        .map_err(|_| EventPassError::Timeout(self.command_timeout))?
        .map_err(|e| EventPassError::Cache(format!("Failed to claim dedup key: {e}")))?;

        let claim = if reply.is_some() { Claim::Won } else { Claim::Lost };

        tracing::debug!(key = %dedup_key, won = claim.is_won(), "Dedup claim");

        Ok(claim)
    }
}
