//! Persistence traits for tickets and orders.
//!
//! # Conditional writes
//!
//! Every state transition is a single conditional `UPDATE`. Implementations
//! return `Ok(None)` (or `Ok(false)`) when the condition matched zero rows;
//! the caller turns that into a business outcome. Nothing here races on a
//! read-then-write.

use crate::error::Result;
use crate::signature::SignatureCodec;
use crate::types::{NewOrder, NewTicket, Order, OrderId, ReprintRequest, Ticket, TicketId};
use chrono::{DateTime, Utc};

/// Ticket storage.
pub trait TicketRepository: Send + Sync {
    /// Insert a ticket and store `codec.sign(id)` atomically.
    ///
    /// # Errors
    ///
    /// Returns error if the insert or the signature update fails.
    fn create_ticket(
        &self,
        ticket: NewTicket,
        codec: &SignatureCodec,
    ) -> impl std::future::Future<Output = Result<Ticket>> + Send;

    /// Fetch a ticket by id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn get_ticket(
        &self,
        id: TicketId,
    ) -> impl std::future::Future<Output = Result<Option<Ticket>>> + Send;

    /// Fetch the ticket whose stored signature equals `signature`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn find_by_signature(
        &self,
        signature: &str,
    ) -> impl std::future::Future<Output = Result<Option<Ticket>>> + Send;

    /// Check in and claim the gift in one write.
    ///
    /// Applies only when the gift is unclaimed, the ticket is not denied
    /// and not expired.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    fn claim_gift(
        &self,
        id: TicketId,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<Ticket>>> + Send;

    /// Move `Pending → CheckedIn` for a live ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    fn mark_checked_in(
        &self,
        id: TicketId,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<Ticket>>> + Send;

    /// Move `Pending → Denied`.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    fn mark_denied(
        &self,
        id: TicketId,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<Ticket>>> + Send;

    /// Store a reprint request and the freshly computed signature together.
    ///
    /// Returns `Ok(None)` without recording anything if the ticket does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns error if the transaction fails.
    fn record_reprint(
        &self,
        request: &ReprintRequest,
        signature: &str,
    ) -> impl std::future::Future<Output = Result<Option<Ticket>>> + Send;

    /// Ids of pending, unvalidated tickets whose horizon is before `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn expired_tickets(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<TicketId>>> + Send;

    /// Move a ticket's status to expired. `Ok(false)` if it was no longer
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    fn expire_ticket(
        &self,
        id: TicketId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

/// Order storage.
pub trait OrderRepository: Send + Sync {
    /// Insert an order.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    fn create_order(
        &self,
        order: NewOrder,
    ) -> impl std::future::Future<Output = Result<Order>> + Send;

    /// Fetch an order by id.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn get_order(
        &self,
        id: OrderId,
    ) -> impl std::future::Future<Output = Result<Option<Order>>> + Send;

    /// Ids of pending orders whose expiry is before `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    fn expired_orders(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<OrderId>>> + Send;

    /// Move an order's status to expired. `Ok(false)` if it was no longer
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    fn expire_order(
        &self,
        id: OrderId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}
