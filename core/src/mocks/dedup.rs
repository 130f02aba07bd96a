//! Mock dedup gate for testing.

use crate::error::{EventPassError, Result};
use crate::providers::{Claim, DedupGate};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// In-memory dedup gate.
///
/// Expiry uses `tokio::time::Instant`, so tests running with paused time
/// can step past the TTL with `tokio::time::advance`.
///
/// **Production**: Use `RedisDedupGate`, which is shared across instances.
#[derive(Debug, Clone, Default)]
pub struct MockDedupGate {
    /// Map of key -> claim deadline
    claims: Arc<Mutex<HashMap<String, Instant>>>,
}

impl MockDedupGate {
    /// Create an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupGate for MockDedupGate {
    async fn try_claim(&self, key: &str, ttl: Duration) -> Result<Claim> {
        let mut claims = self
            .claims
            .lock()
            .map_err(|_| EventPassError::Cache("Mutex lock failed".into()))?;

        let now = Instant::now();
        claims.retain(|_, deadline| *deadline > now);

        if claims.contains_key(key) {
            tracing::debug!(key = %key, "Mock dedup claim lost");
            return Ok(Claim::Lost);
        }

        claims.insert(key.to_string(), now + ttl);
        tracing::debug!(key = %key, ttl = ?ttl, "Mock dedup claim won");

        Ok(Claim::Won)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_second_claim_within_window_loses() {
        let gate = MockDedupGate::new();
        assert_eq!(gate.try_claim("qr", TTL).await.unwrap(), Claim::Won);
        assert_eq!(gate.try_claim("qr", TTL).await.unwrap(), Claim::Lost);
        assert_eq!(gate.try_claim("other", TTL).await.unwrap(), Claim::Won);
    }

    #[test]
    fn test_loser_is_ready_on_first_poll() {
        let gate = MockDedupGate::new();
        assert!(tokio_test::block_on(gate.try_claim("qr", TTL)).unwrap().is_won());

        let mut attempt = tokio_test::task::spawn(gate.try_claim("qr", TTL));
        let claim = tokio_test::assert_ready!(attempt.poll()).unwrap();
        assert_eq!(claim, Claim::Lost);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_lapses_after_ttl() {
        let gate = MockDedupGate::new();
        assert!(gate.try_claim("qr", TTL).await.unwrap().is_won());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!gate.try_claim("qr", TTL).await.unwrap().is_won());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(gate.try_claim("qr", TTL).await.unwrap().is_won());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_have_one_winner() {
        let gate = MockDedupGate::new();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.try_claim("burst", TTL).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_won() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
