//! Ticket issuance and reprinting.

use crate::environment::Clock;
use crate::error::{EventPassError, Result};
use crate::providers::TicketRepository;
use crate::signature::SignatureCodec;
use crate::types::{NewTicket, Operator, ReprintRequest, Ticket, TicketId};
use chrono::Duration;
use std::sync::Arc;

/// Issues signed tickets and re-issues lost ones.
pub struct TicketIssuer<R> {
    repository: Arc<R>,
    codec: Arc<SignatureCodec>,
    clock: Arc<dyn Clock>,
    horizon: Duration,
}

impl<R: TicketRepository> TicketIssuer<R> {
    /// Create an issuer with the default 24 hour horizon.
    #[must_use]
    pub fn new(repository: Arc<R>, codec: Arc<SignatureCodec>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            codec,
            clock,
            horizon: Duration::hours(24),
        }
    }

    /// Override the ticket horizon.
    #[must_use]
    pub const fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    /// Issue a ticket for `email` to `event_id`.
    ///
    /// The returned ticket is pending, unvalidated, and already carries its
    /// signature.
    ///
    /// # Errors
    ///
    /// Returns error if the repository fails, in which case no partial
    /// ticket is left behind, or if the horizon overflows the clock.
    pub async fn issue(&self, event_id: i64, email: impl Into<String>) -> Result<Ticket> {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.horizon)
            .ok_or_else(|| {
                EventPassError::Config(format!("ticket horizon {} out of range", self.horizon))
            })?;

        let ticket = self
            .repository
            .create_ticket(
                NewTicket {
                    event_id,
                    email: email.into(),
                    expires_at,
                },
                &self.codec,
            )
            .await?;

        tracing::info!(ticket_id = %ticket.id, event_id, "Ticket issued");
        metrics::counter!("eventpass.tickets.issued").increment(1);

        Ok(ticket)
    }

    /// Re-issue a ticket on behalf of `operator`.
    ///
    /// Records one reprint request and stores `sign(id)` again. Returns
    /// `Ok(None)` for an unknown ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the repository fails.
    pub async fn reprint(&self, ticket_id: TicketId, operator: &Operator) -> Result<Option<Ticket>> {
        let request = ReprintRequest {
            ticket_id,
            requested_by: operator.id.clone(),
            created_at: self.clock.now(),
        };
        let signature = self.codec.sign(ticket_id);

        let ticket = self.repository.record_reprint(&request, &signature).await?;

        match &ticket {
            Some(_) => tracing::info!(
                ticket_id = %ticket_id,
                operator = %operator.email,
                "Ticket reprinted"
            ),
            None => tracing::debug!(ticket_id = %ticket_id, "Reprint requested for unknown ticket"),
        }

        Ok(ticket)
    }
}
