//! Check-in state machine.
//!
//! # States
//!
//! ```text
//! validation:  pending ──► checked_in
//!                 │
//!                 └──────► denied
//!
//! gift:        unset ──► set            (independent, terminal once set)
//! ```
//!
//! # Scan flow
//!
//! ```text
//! token ─► DedupGate ─► resolve by signature ─► verify HMAC ─► conditional write ─► publish
//!            │ lost          │ none                 │ bad            │ 0 rows
//!            ▼               ▼                      ▼                ▼
//!      TooManyRequests    NotFound          InvalidSignature   AlreadyClaimed / Denied / Expired
//! ```
//!
//! At most one transition per ticket is guaranteed by the repository's
//! conditional `UPDATE`, not by the gate. The gate only throttles repeated
//! tokens so a burst costs one signature check and one write per window.

use crate::environment::Clock;
use crate::error::Result;
use crate::providers::{CheckInPublisher, DedupGate, TicketRepository};
use crate::signature::SignatureCodec;
use crate::types::{Ticket, TicketId, ValidationState};
use std::sync::Arc;
use std::time::Duration;

/// Check-in configuration.
#[derive(Debug, Clone)]
pub struct CheckInConfig {
    /// Dedup window for repeated scans of the same token.
    ///
    /// Default: 5 seconds
    pub dedup_ttl: Duration,
}

impl CheckInConfig {
    /// Set the dedup window.
    #[must_use]
    pub const fn with_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            dedup_ttl: Duration::from_secs(5),
        }
    }
}

/// Result of the conditional check-in write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// This call checked the ticket in and claimed the gift
    CheckedIn(Ticket),
    /// The gift was claimed before (possibly by a concurrent caller)
    AlreadyClaimed(Ticket),
    /// The ticket was denied earlier and stays denied
    Denied(Ticket),
    /// The ticket expired before it was used
    Expired(Ticket),
}

/// Answer to a scanned token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Admitted, gift claimed
    CheckedIn(Ticket),
    /// No ticket carries this token
    NotFound,
    /// Gift already handed out
    AlreadyClaimed(Ticket),
    /// Same token scanned within the dedup window
    TooManyRequests,
    /// Token does not verify under the current secret
    InvalidSignature,
    /// Ticket was denied earlier
    Denied(Ticket),
    /// Ticket expired
    Expired(Ticket),
}

impl ScanOutcome {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CheckedIn(_) => "checked_in",
            Self::NotFound => "not_found",
            Self::AlreadyClaimed(_) => "already_claimed",
            Self::TooManyRequests => "too_many_requests",
            Self::InvalidSignature => "invalid_signature",
            Self::Denied(_) => "denied",
            Self::Expired(_) => "expired",
        }
    }
}

impl From<CheckInOutcome> for ScanOutcome {
    fn from(outcome: CheckInOutcome) -> Self {
        match outcome {
            CheckInOutcome::CheckedIn(t) => Self::CheckedIn(t),
            CheckInOutcome::AlreadyClaimed(t) => Self::AlreadyClaimed(t),
            CheckInOutcome::Denied(t) => Self::Denied(t),
            CheckInOutcome::Expired(t) => Self::Expired(t),
        }
    }
}

/// Answer to an explicit `(ticket id, signature)` validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Signature valid, ticket checked in by this call
    Ok(Ticket),
    /// Signature invalid, denial recorded by this call
    Denied(Ticket),
    /// Ticket already left `pending`; nothing was changed
    AlreadyFinalized(Ticket),
    /// Ticket expired before validation
    Expired(Ticket),
    /// Unknown ticket id
    NotFound,
}

impl Verdict {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ok(_) => "ok",
            Self::Denied(_) => "denied",
            Self::AlreadyFinalized(_) => "already_finalized",
            Self::Expired(_) => "expired",
            Self::NotFound => "not_found",
        }
    }
}

/// Applies scans and validations to tickets.
///
/// Safe to share across request tasks; all coordination happens in the
/// dedup gate and the repository's conditional writes.
pub struct CheckInStateMachine<R, G, P> {
    repository: Arc<R>,
    gate: Arc<G>,
    publisher: Arc<P>,
    codec: Arc<SignatureCodec>,
    clock: Arc<dyn Clock>,
    config: CheckInConfig,
}

impl<R, G, P> CheckInStateMachine<R, G, P>
where
    R: TicketRepository,
    G: DedupGate,
    P: CheckInPublisher,
{
    /// Create a state machine over the given collaborators.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        gate: Arc<G>,
        publisher: Arc<P>,
        codec: Arc<SignatureCodec>,
        clock: Arc<dyn Clock>,
        config: CheckInConfig,
    ) -> Self {
        Self {
            repository,
            gate,
            publisher,
            codec,
            clock,
            config,
        }
    }

    /// Look up the ticket whose stored signature equals the scanned token.
    ///
    /// # Errors
    ///
    /// Returns error if the repository is unavailable.
    pub async fn resolve_by_token(&self, token: &str) -> Result<Option<Ticket>> {
        self.repository.find_by_signature(token).await
    }

    /// Check the ticket in and claim its gift with a single conditional write.
    ///
    /// When the write matches zero rows the ticket is re-read to report why.
    /// Concurrent callers on the same ticket get exactly one `CheckedIn`.
    ///
    /// # Errors
    ///
    /// Returns error if the repository is unavailable. A timeout here is an
    /// unknown outcome; re-resolve before retrying.
    pub async fn check_in(&self, ticket: &Ticket) -> Result<CheckInOutcome> {
        if ticket.gift_claimed() {
            return Ok(CheckInOutcome::AlreadyClaimed(ticket.clone()));
        }

        let now = self.clock.now();
        if let Some(updated) = self.repository.claim_gift(ticket.id, now).await? {
            tracing::info!(
                ticket_id = %updated.id,
                event_id = updated.event_id,
                "Ticket checked in, gift claimed"
            );
            return Ok(CheckInOutcome::CheckedIn(updated));
        }

        let current = self
            .repository
            .get_ticket(ticket.id)
            .await?
            .unwrap_or_else(|| ticket.clone());

        Ok(if current.state == ValidationState::Denied {
            CheckInOutcome::Denied(current)
        } else if current.gift_claimed() {
            CheckInOutcome::AlreadyClaimed(current)
        } else if current.is_expired() {
            CheckInOutcome::Expired(current)
        } else {
            CheckInOutcome::AlreadyClaimed(current)
        })
    }

    /// Validate an explicit `(ticket id, signature)` pair.
    ///
    /// A bad signature records a denial. Both `denied` and `checked_in` are
    /// terminal: later calls return [`Verdict::AlreadyFinalized`] and change
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns error if the repository is unavailable.
    pub async fn validate_signature(&self, ticket_id: TicketId, signature: &str) -> Result<Verdict> {
        let verdict = self.validate_inner(ticket_id, signature).await?;

        metrics::counter!("eventpass.validation.verdict", "verdict" => verdict.label())
            .increment(1);

        Ok(verdict)
    }

    async fn validate_inner(&self, ticket_id: TicketId, signature: &str) -> Result<Verdict> {
        let Some(ticket) = self.repository.get_ticket(ticket_id).await? else {
            return Ok(Verdict::NotFound);
        };

        if ticket.state.is_terminal() {
            tracing::debug!(
                ticket_id = %ticket.id,
                state = ticket.state.as_str(),
                "Validation ignored, ticket already finalized"
            );
            return Ok(Verdict::AlreadyFinalized(ticket));
        }

        if ticket.is_expired() {
            return Ok(Verdict::Expired(ticket));
        }

        let now = self.clock.now();

        if !self.codec.verify(ticket_id, signature) {
            return match self.repository.mark_denied(ticket_id, now).await? {
                Some(denied) => {
                    tracing::warn!(ticket_id = %ticket_id, "Invalid signature, ticket denied");
                    Ok(Verdict::Denied(denied))
                }
                None => Ok(self.finalized(ticket).await?),
            };
        }

        match self.repository.mark_checked_in(ticket_id, now).await? {
            Some(checked_in) => {
                tracing::info!(ticket_id = %ticket_id, "Ticket validated and checked in");
                Ok(Verdict::Ok(checked_in))
            }
            None => Ok(self.finalized(ticket).await?),
        }
    }

    /// Re-read after a lost conditional write.
    async fn finalized(&self, stale: Ticket) -> Result<Verdict> {
        let current = self
            .repository
            .get_ticket(stale.id)
            .await?
            .unwrap_or(stale);

        Ok(if current.state.is_terminal() {
            Verdict::AlreadyFinalized(current)
        } else if current.is_expired() {
            Verdict::Expired(current)
        } else {
            Verdict::AlreadyFinalized(current)
        })
    }

    /// Handle a raw scanned token end to end.
    ///
    /// # Errors
    ///
    /// Returns error on cache or database failure. The scan is then rejected
    /// as retryable; the gate is never bypassed.
    pub async fn scan(&self, token: &str) -> Result<ScanOutcome> {
        let outcome = self.scan_inner(token).await?;

        metrics::counter!("eventpass.scan.outcome", "outcome" => outcome.label()).increment(1);
        tracing::debug!(outcome = outcome.label(), "Scan processed");

        Ok(outcome)
    }

    async fn scan_inner(&self, token: &str) -> Result<ScanOutcome> {
        if !self
            .gate
            .try_claim(token, self.config.dedup_ttl)
            .await?
            .is_won()
        {
            return Ok(ScanOutcome::TooManyRequests);
        }

        let Some(ticket) = self.resolve_by_token(token).await? else {
            return Ok(ScanOutcome::NotFound);
        };

        if !self.codec.verify(ticket.id, token) {
            // Stored signature predates the current secret.
            if self
                .repository
                .mark_denied(ticket.id, self.clock.now())
                .await?
                .is_some()
            {
                tracing::warn!(ticket_id = %ticket.id, "Stale signature scanned, ticket denied");
            }
            return Ok(ScanOutcome::InvalidSignature);
        }

        let outcome = self.check_in(&ticket).await?;

        if let CheckInOutcome::CheckedIn(updated) = &outcome {
            self.publish(updated).await;
        }

        Ok(outcome.into())
    }

    async fn publish(&self, ticket: &Ticket) {
        if let Err(e) = self.publisher.publish_check_in(ticket).await {
            tracing::warn!(
                ticket_id = %ticket.id,
                error = %e,
                "Failed to publish check-in event"
            );
            metrics::counter!("eventpass.publish.failures").increment(1);
        }
    }
}
