//! Application state for the HTTP server.

use eventpass_core::{CheckInStateMachine, TicketIssuer};
use eventpass_postgres::{FailoverStore, PostgresRepository};
use eventpass_redis::{RedisCheckInPublisher, RedisDedupGate};
use sqlx::PgPool;
use std::sync::Arc;

/// Shared resources for every handler, cloned per request.
///
/// Generic over the collaborators so handler tests run against in-memory
/// mocks; production uses [`ProductionState`].
pub struct AppState<R, G, P, C = PgPool> {
    /// Scan and validation flows
    pub machine: Arc<CheckInStateMachine<R, G, P>>,
    /// Issuance and reprints
    pub issuer: Arc<TicketIssuer<R>>,
    /// Database handle, for readiness
    pub store: Arc<FailoverStore<C>>,
}

/// State wired to `PostgreSQL` and Redis.
pub type ProductionState = AppState<PostgresRepository, RedisDedupGate, RedisCheckInPublisher>;

impl<R, G, P, C> AppState<R, G, P, C> {
    /// Create a new application state.
    #[must_use]
    pub const fn new(
        machine: Arc<CheckInStateMachine<R, G, P>>,
        issuer: Arc<TicketIssuer<R>>,
        store: Arc<FailoverStore<C>>,
    ) -> Self {
        Self {
            machine,
            issuer,
            store,
        }
    }
}

// Manual impl: the derive would demand `R: Clone` and friends.
impl<R, G, P, C> Clone for AppState<R, G, P, C> {
    fn clone(&self) -> Self {
        Self {
            machine: Arc::clone(&self.machine),
            issuer: Arc::clone(&self.issuer),
            store: Arc::clone(&self.store),
        }
    }
}
