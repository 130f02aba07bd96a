//! Periodic expiry of stale tickets and orders.
//!
//! Each tick lists candidates and expires them one by one. A failure on one
//! record is logged and counted; the rest of the batch still runs. A failed
//! listing skips that half of the sweep until the next tick.

use crate::environment::Clock;
use crate::providers::{OrderRepository, TicketRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweeps.
    ///
    /// Default: 60 seconds
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Tickets moved to `expired`
    pub tickets_expired: u64,
    /// Orders moved to `expired`
    pub orders_expired: u64,
    /// Records (or listings) that failed
    pub failures: u64,
}

/// Expires tickets and orders past their horizon.
pub struct ExpirySweeper<T, O> {
    tickets: Arc<T>,
    orders: Arc<O>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
}

impl<T, O> ExpirySweeper<T, O>
where
    T: TicketRepository + 'static,
    O: OrderRepository + 'static,
{
    /// Create a sweeper.
    #[must_use]
    pub fn new(tickets: Arc<T>, orders: Arc<O>, clock: Arc<dyn Clock>, config: SweeperConfig) -> Self {
        Self {
            tickets,
            orders,
            clock,
            config,
        }
    }

    /// Run one sweep over tickets, then orders.
    pub async fn sweep_once(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        match self.tickets.expired_tickets(now).await {
            Ok(ids) => {
                for id in ids {
                    match self.tickets.expire_ticket(id).await {
                        Ok(true) => report.tickets_expired += 1,
                        // Checked in or expired concurrently
                        Ok(false) => {}
                        Err(e) => {
                            tracing::error!(ticket_id = %id, error = %e, "Failed to expire ticket");
                            metrics::counter!("eventpass.sweeper.failures", "kind" => "ticket")
                                .increment(1);
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to list expired tickets");
                metrics::counter!("eventpass.sweeper.failures", "kind" => "ticket").increment(1);
                report.failures += 1;
            }
        }

        match self.orders.expired_orders(now).await {
            Ok(ids) => {
                for id in ids {
                    match self.orders.expire_order(id).await {
                        Ok(true) => report.orders_expired += 1,
                        Ok(false) => {}
                        Err(e) => {
                            tracing::error!(order_id = %id, error = %e, "Failed to expire order");
                            metrics::counter!("eventpass.sweeper.failures", "kind" => "order")
                                .increment(1);
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to list expired orders");
                metrics::counter!("eventpass.sweeper.failures", "kind" => "order").increment(1);
                report.failures += 1;
            }
        }

        metrics::counter!("eventpass.sweeper.expired", "kind" => "ticket")
            .increment(report.tickets_expired);
        metrics::counter!("eventpass.sweeper.expired", "kind" => "order")
            .increment(report.orders_expired);

        tracing::info!(
            tickets_expired = report.tickets_expired,
            orders_expired = report.orders_expired,
            failures = report.failures,
            "Expiry sweep completed"
        );

        report
    }

    /// Sweep on every interval tick until `shutdown` turns `true`.
    ///
    /// The first sweep runs immediately. Ticks missed while a sweep is slow
    /// are skipped, so sweeps never overlap.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(interval = ?self.config.interval, "Expiry sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Expiry sweeper stopped");
        })
    }
}
