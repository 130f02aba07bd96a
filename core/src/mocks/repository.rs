//! Mock ticket and order repository for testing.

use crate::error::{EventPassError, Result};
use crate::providers::{OrderRepository, TicketRepository};
use crate::signature::SignatureCodec;
use crate::types::{
    NewOrder, NewTicket, Order, OrderId, OrderStatus, ReprintRequest, Ticket, TicketId,
    TicketStatus, ValidationState,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct State {
    tickets: BTreeMap<TicketId, Ticket>,
    orders: BTreeMap<OrderId, Order>,
    reprints: Vec<ReprintRequest>,
    next_ticket_id: i64,
    next_order_id: i64,
    gift_claim_writes: HashMap<TicketId, u32>,
    denial_writes: HashMap<TicketId, u32>,
    fail_next_write: bool,
    failing_tickets: HashSet<TicketId>,
    failing_orders: HashSet<OrderId>,
}

/// In-memory repository implementing both [`TicketRepository`] and
/// [`OrderRepository`].
///
/// Conditional writes are evaluated under a single mutex, which gives the
/// same one-winner guarantee as a row-level conditional `UPDATE`.
#[derive(Debug, Clone)]
pub struct MockRepository {
    state: Arc<Mutex<State>>,
}

impl MockRepository {
    /// Create an empty repository. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create an empty repository whose next ticket id is `next_ticket_id`.
    #[must_use]
    pub fn starting_at(next_ticket_id: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                tickets: BTreeMap::new(),
                orders: BTreeMap::new(),
                reprints: Vec::new(),
                next_ticket_id,
                next_order_id: 1,
                gift_claim_writes: HashMap::new(),
                denial_writes: HashMap::new(),
                fail_next_write: false,
                failing_tickets: HashSet::new(),
                failing_orders: HashSet::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| EventPassError::Storage("Mutex lock failed".into()))
    }

    fn inspect(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next write of any kind fail with a storage error.
    pub fn fail_next_write(&self) {
        self.inspect().fail_next_write = true;
    }

    /// Make every `expire_ticket` call for `id` fail.
    pub fn fail_expiry_of_ticket(&self, id: TicketId) {
        self.inspect().failing_tickets.insert(id);
    }

    /// Make every `expire_order` call for `id` fail.
    pub fn fail_expiry_of_order(&self, id: OrderId) {
        self.inspect().failing_orders.insert(id);
    }

    /// Replace a stored signature, as if it had been signed with an older
    /// secret.
    pub fn overwrite_signature(&self, id: TicketId, signature: &str) {
        if let Some(ticket) = self.inspect().tickets.get_mut(&id) {
            ticket.signature = Some(signature.to_string());
        }
    }

    /// Number of successful gift-claim writes for `id`.
    #[must_use]
    pub fn gift_claim_writes(&self, id: TicketId) -> u32 {
        self.inspect().gift_claim_writes.get(&id).copied().unwrap_or(0)
    }

    /// Number of successful denial writes for `id`.
    #[must_use]
    pub fn denial_writes(&self, id: TicketId) -> u32 {
        self.inspect().denial_writes.get(&id).copied().unwrap_or(0)
    }

    /// Reprint requests recorded so far.
    #[must_use]
    pub fn reprints(&self) -> Vec<ReprintRequest> {
        self.inspect().reprints.clone()
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn take_injected_failure(&mut self) -> Result<()> {
        if std::mem::take(&mut self.fail_next_write) {
            return Err(EventPassError::Storage("injected write failure".into()));
        }
        Ok(())
    }

    /// Apply `update` to ticket `id` if `condition` holds.
    fn update_ticket_if(
        &mut self,
        id: TicketId,
        condition: impl FnOnce(&Ticket) -> bool,
        update: impl FnOnce(&mut Ticket),
    ) -> Result<Option<Ticket>> {
        self.take_injected_failure()?;

        match self.tickets.get_mut(&id) {
            Some(ticket) if condition(ticket) => {
                update(ticket);
                Ok(Some(ticket.clone()))
            }
            _ => Ok(None),
        }
    }
}

impl TicketRepository for MockRepository {
    async fn create_ticket(&self, ticket: NewTicket, codec: &SignatureCodec) -> Result<Ticket> {
        let mut state = self.lock()?;
        state.take_injected_failure()?;

        let id = TicketId(state.next_ticket_id);
        state.next_ticket_id += 1;

        let now = Utc::now();
        let created = Ticket {
            id,
            event_id: ticket.event_id,
            email: ticket.email,
            status: TicketStatus::Pending,
            state: ValidationState::Pending,
            gift_claimed_at: None,
            expires_at: ticket.expires_at,
            signature: Some(codec.sign(id)),
            qr_code_url: None,
            created_at: now,
            updated_at: now,
        };
        state.tickets.insert(id, created.clone());

        Ok(created)
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        Ok(self.lock()?.tickets.get(&id).cloned())
    }

    async fn find_by_signature(&self, signature: &str) -> Result<Option<Ticket>> {
        Ok(self
            .lock()?
            .tickets
            .values()
            .find(|t| t.signature.as_deref() == Some(signature))
            .cloned())
    }

    async fn claim_gift(&self, id: TicketId, at: DateTime<Utc>) -> Result<Option<Ticket>> {
        let mut state = self.lock()?;
        let updated = state.update_ticket_if(
            id,
            |t| {
                t.gift_claimed_at.is_none()
                    && t.state != ValidationState::Denied
                    && t.status == TicketStatus::Pending
            },
            |t| {
                t.state = ValidationState::CheckedIn;
                t.gift_claimed_at = Some(at);
                t.updated_at = at;
            },
        )?;
        if updated.is_some() {
            *state.gift_claim_writes.entry(id).or_insert(0) += 1;
        }
        Ok(updated)
    }

    async fn mark_checked_in(&self, id: TicketId, at: DateTime<Utc>) -> Result<Option<Ticket>> {
        self.lock()?.update_ticket_if(
            id,
            |t| t.state == ValidationState::Pending && t.status == TicketStatus::Pending,
            |t| {
                t.state = ValidationState::CheckedIn;
                t.updated_at = at;
            },
        )
    }

    async fn mark_denied(&self, id: TicketId, at: DateTime<Utc>) -> Result<Option<Ticket>> {
        let mut state = self.lock()?;
        let updated = state.update_ticket_if(
            id,
            |t| t.state == ValidationState::Pending,
            |t| {
                t.state = ValidationState::Denied;
                t.updated_at = at;
            },
        )?;
        if updated.is_some() {
            *state.denial_writes.entry(id).or_insert(0) += 1;
        }
        Ok(updated)
    }

    async fn record_reprint(
        &self,
        request: &ReprintRequest,
        signature: &str,
    ) -> Result<Option<Ticket>> {
        let mut state = self.lock()?;
        let updated = state.update_ticket_if(
            request.ticket_id,
            |_| true,
            |t| {
                t.signature = Some(signature.to_string());
                t.updated_at = request.created_at;
            },
        )?;
        if updated.is_some() {
            state.reprints.push(request.clone());
        }
        Ok(updated)
    }

    async fn expired_tickets(&self, now: DateTime<Utc>) -> Result<Vec<TicketId>> {
        Ok(self
            .lock()?
            .tickets
            .values()
            .filter(|t| {
                t.status == TicketStatus::Pending
                    && t.state == ValidationState::Pending
                    && t.expires_at < now
            })
            .map(|t| t.id)
            .collect())
    }

    async fn expire_ticket(&self, id: TicketId) -> Result<bool> {
        let mut state = self.lock()?;
        if state.failing_tickets.contains(&id) {
            return Err(EventPassError::Storage(format!("injected failure expiring ticket {id}")));
        }
        let updated = state.update_ticket_if(
            id,
            |t| t.status == TicketStatus::Pending && t.state == ValidationState::Pending,
            |t| t.status = TicketStatus::Expired,
        )?;
        Ok(updated.is_some())
    }
}

impl OrderRepository for MockRepository {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let mut state = self.lock()?;
        state.take_injected_failure()?;

        let id = OrderId(state.next_order_id);
        state.next_order_id += 1;

        let created = Order {
            id,
            event_id: order.event_id,
            email: order.email,
            status: OrderStatus::Pending,
            expires_at: order.expires_at,
            created_at: Utc::now(),
        };
        state.orders.insert(id, created.clone());

        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.lock()?.orders.get(&id).cloned())
    }

    async fn expired_orders(&self, now: DateTime<Utc>) -> Result<Vec<OrderId>> {
        Ok(self
            .lock()?
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.expires_at < now)
            .map(|o| o.id)
            .collect())
    }

    async fn expire_order(&self, id: OrderId) -> Result<bool> {
        let mut state = self.lock()?;
        if state.failing_orders.contains(&id) {
            return Err(EventPassError::Storage(format!("injected failure expiring order {id}")));
        }
        state.take_injected_failure()?;

        match state.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = OrderStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
