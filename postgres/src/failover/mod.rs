//! Primary/replica failover.
//!
//! # Modes
//!
//! - **Hot standby**: both pools live for the whole process. A
//!   [`FailoverMonitor`] probes the primary and swaps the active role when
//!   it stops answering, and swaps back once it recovers (unless failback is
//!   disabled).
//! - **Cold fallback**: at startup, use the primary if it answers, otherwise
//!   the fallback. The choice is never revisited.
//!
//! # Locking
//!
//! The active role sits behind a `tokio::sync::RwLock`. Callers take the
//! read lock only long enough to clone the active connection handle; the
//! round-trip itself runs without the lock. A swap takes the write lock, so
//! no caller ever observes a half-applied switch.
//!
//! Query errors are returned to the caller and never trigger a swap. Only
//! the monitor's health probe does.

mod monitor;
mod pool;

pub use monitor::FailoverMonitor;
pub use pool::{ExecResult, Rows};

use crate::error::StoreError;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;

/// Which database currently serves traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The writable primary
    Primary,
    /// The standby replica, or the cold fallback
    Replica,
}

impl Role {
    /// Stable label for logs, metrics and the readiness endpoint.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Replica => "replica",
        }
    }
}

/// Liveness check for a connection handle.
///
/// `PgPool` answers with `SELECT 1`. Tests substitute fake connections.
pub trait HealthProbe: Clone + Send + Sync + 'static {
    /// Probe the connection once.
    ///
    /// # Errors
    ///
    /// Returns error if the database does not answer.
    fn probe(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl HealthProbe for PgPool {
    async fn probe(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(self).await?;
        Ok(())
    }
}

/// Failover policy and the connections it owns.
#[derive(Debug)]
pub enum FailoverMode<C> {
    /// Both connections live; the monitor picks the active one.
    HotStandby {
        /// Preferred connection
        primary: C,
        /// Standby connection
        replica: C,
    },
    /// One connection chosen at startup, never swapped.
    ColdFallback {
        /// The chosen connection
        active: C,
        /// Which database it is
        role: Role,
    },
}

/// Failover tuning.
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    /// Time between primary health probes.
    ///
    /// Default: 5 seconds
    pub probe_interval: Duration,

    /// Deadline for every query, transaction start and probe.
    ///
    /// Default: 5 seconds
    pub query_timeout: Duration,

    /// Return to the primary once it answers again.
    ///
    /// Default: true
    pub failback: bool,

    /// Pool size per database.
    ///
    /// Default: 10
    pub max_connections: u32,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(5),
            query_timeout: Duration::from_secs(5),
            failback: true,
            max_connections: 10,
        }
    }
}

/// The only persistence handle in the process.
///
/// Generic over the connection type so the switching logic can be driven by
/// fake connections; production uses `FailoverStore<PgPool>`.
#[derive(Debug)]
pub struct FailoverStore<C = PgPool> {
    mode: FailoverMode<C>,
    active: RwLock<Role>,
    config: FailoverConfig,
}

impl<C: HealthProbe> FailoverStore<C> {
    /// Build a store over already-open connections.
    ///
    /// Hot standby starts on the primary; cold fallback on whatever role it
    /// was given.
    #[must_use]
    pub fn new(mode: FailoverMode<C>, config: FailoverConfig) -> Self {
        let role = match &mode {
            FailoverMode::HotStandby { .. } => Role::Primary,
            FailoverMode::ColdFallback { role, .. } => *role,
        };

        Self {
            mode,
            active: RwLock::new(role),
            config,
        }
    }

    /// Currently active role.
    pub async fn role(&self) -> Role {
        *self.active.read().await
    }

    /// `true` for hot standby, where the monitor may swap roles.
    #[must_use]
    pub const fn is_hot_standby(&self) -> bool {
        matches!(self.mode, FailoverMode::HotStandby { .. })
    }

    /// Tuning in effect.
    #[must_use]
    pub const fn config(&self) -> &FailoverConfig {
        &self.config
    }

    /// Clone the active connection handle.
    pub async fn active_connection(&self) -> C {
        match &self.mode {
            FailoverMode::HotStandby { primary, replica } => {
                let role = self.active.read().await;
                match *role {
                    Role::Primary => primary.clone(),
                    Role::Replica => replica.clone(),
                }
            }
            FailoverMode::ColdFallback { active, .. } => active.clone(),
        }
    }

    /// Probe the active connection.
    ///
    /// # Errors
    ///
    /// Returns error if the active database does not answer in time.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let conn = self.active_connection().await;
        self.bounded(conn.probe()).await
    }

    /// Run `fut` under the query deadline.
    pub(crate) async fn bounded<T, E, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StoreError>,
    {
        tokio::time::timeout(self.config.query_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.config.query_timeout))?
            .map_err(Into::into)
    }

    /// Probe the primary of a hot-standby pair. `None` in cold fallback.
    async fn probe_primary(&self) -> Option<bool> {
        match &self.mode {
            FailoverMode::HotStandby { primary, .. } => {
                Some(self.bounded(primary.probe()).await.is_ok())
            }
            FailoverMode::ColdFallback { .. } => None,
        }
    }

    /// Make `target` the active role. No-op if it already is.
    async fn switch_to(&self, target: Role) -> Role {
        let mut role = self.active.write().await;
        if *role != target {
            tracing::warn!(
                from = role.as_str(),
                to = target.as_str(),
                "Database failover"
            );
            metrics::counter!("eventpass.failover.swaps", "to" => target.as_str()).increment(1);
            *role = target;
        }
        target
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Connection whose health is toggled by the test.
    #[derive(Debug, Clone)]
    pub struct FakeConn {
        pub name: &'static str,
        healthy: Arc<AtomicBool>,
        hang: Arc<AtomicBool>,
    }

    impl FakeConn {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                healthy: Arc::new(AtomicBool::new(true)),
                hang: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }

        pub fn set_hang(&self, hang: bool) {
            self.hang.store(hang, Ordering::SeqCst);
        }
    }

    impl HealthProbe for FakeConn {
        async fn probe(&self) -> Result<(), StoreError> {
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(StoreError::Unavailable(format!("{} is down", self.name)))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fake::FakeConn;
    use super::*;

    fn hot() -> (FailoverStore<FakeConn>, FakeConn, FakeConn) {
        let primary = FakeConn::new("primary");
        let replica = FakeConn::new("replica");
        let store = FailoverStore::new(
            FailoverMode::HotStandby {
                primary: primary.clone(),
                replica: replica.clone(),
            },
            FailoverConfig::default(),
        );
        (store, primary, replica)
    }

    #[tokio::test]
    async fn test_hot_standby_starts_on_primary() {
        let (store, _, _) = hot();
        assert_eq!(store.role().await, Role::Primary);
        assert_eq!(store.active_connection().await.name, "primary");
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_switch_is_idempotent() {
        let (store, _, _) = hot();
        assert_eq!(store.switch_to(Role::Replica).await, Role::Replica);
        assert_eq!(store.switch_to(Role::Replica).await, Role::Replica);
        assert_eq!(store.active_connection().await.name, "replica");
    }

    #[tokio::test]
    async fn test_cold_fallback_uses_given_connection() {
        let store = FailoverStore::new(
            FailoverMode::ColdFallback {
                active: FakeConn::new("fallback"),
                role: Role::Replica,
            },
            FailoverConfig::default(),
        );
        assert!(!store.is_hot_standby());
        assert_eq!(store.role().await, Role::Replica);
        assert_eq!(store.active_connection().await.name, "fallback");
        assert_eq!(store.probe_primary().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_ping_times_out() {
        let (store, primary, _) = hot();
        primary.set_hang(true);

        let result = store.ping().await;

        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_transaction_statement_times_out() {
        let (store, _, _) = hot();
        let hung_commit = std::future::pending::<Result<(), sqlx::Error>>();

        let result = store.bounded(hung_commit).await;

        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == Duration::from_secs(5)));
    }
}
