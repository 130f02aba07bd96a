//! Health probe loop driving hot-standby swaps.

use super::{FailoverStore, HealthProbe, Role};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodically probes the primary and swaps the active role.
///
/// In cold fallback the monitor only reports the fixed role.
#[derive(Debug)]
pub struct FailoverMonitor<C> {
    store: Arc<FailoverStore<C>>,
}

impl<C: HealthProbe> FailoverMonitor<C> {
    /// Monitor `store`.
    #[must_use]
    pub const fn new(store: Arc<FailoverStore<C>>) -> Self {
        Self { store }
    }

    /// Probe once and apply the resulting swap, if any.
    ///
    /// - On the primary, a failed probe swaps to the replica.
    /// - On the replica with failback enabled, a successful probe swaps back.
    ///
    /// Returns the role active afterwards.
    pub async fn probe_once(&self) -> Role {
        let Some(primary_healthy) = self.store.probe_primary().await else {
            return self.store.role().await;
        };

        let current = self.store.role().await;
        match (current, primary_healthy) {
            (Role::Primary, false) => self.store.switch_to(Role::Replica).await,
            (Role::Replica, true) if self.store.config().failback => {
                self.store.switch_to(Role::Primary).await
            }
            _ => {
                tracing::trace!(role = current.as_str(), primary_healthy, "Health probe");
                current
            }
        }
    }

    /// Probe every `probe_interval` until `shutdown` turns `true`.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.store.is_hot_standby() {
                tracing::info!("Cold fallback mode, failover monitor idle");
                return;
            }

            let mut ticker = tokio::time::interval(self.store.config().probe_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                interval = ?self.store.config().probe_interval,
                failback = self.store.config().failback,
                "Failover monitor started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.probe_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Failover monitor stopped");
        })
    }
}
