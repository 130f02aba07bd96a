//! `PostgreSQL` ticket and order repository.
//!
//! Every call goes through [`FailoverStore`]; nothing here holds a pool of
//! its own. State transitions are single conditional `UPDATE ... RETURNING`
//! statements, so concurrent callers race inside the database and exactly
//! one of them sees a row come back. Statements inside a transaction run
//! under the same query deadline as single statements.

use crate::error::StoreError;
use crate::failover::FailoverStore;
use chrono::{DateTime, Utc};
use eventpass_core::error::Result;
use eventpass_core::providers::{OrderRepository, TicketRepository};
use eventpass_core::{
    NewOrder, NewTicket, Order, OrderId, OrderStatus, ReprintRequest, SignatureCodec, Ticket,
    TicketId, TicketStatus, ValidationState,
};
use sqlx::Row;
use sqlx::postgres::PgRow;
use std::sync::Arc;

const TICKET_COLUMNS: &str = "id, event_id, email, status, state, gift_claimed_at, expires_at, \
                              hmac_signature, qr_code_url, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, event_id, email, status, expires_at, created_at";

/// Ticket and order persistence over the failover store.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    store: Arc<FailoverStore>,
}

impl PostgresRepository {
    /// Create a repository over `store`.
    #[must_use]
    pub const fn new(store: Arc<FailoverStore>) -> Self {
        Self { store }
    }

    /// Run database migrations on the active database.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> std::result::Result<(), StoreError> {
        let pool = self.store.active_connection().await;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(())
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &FailoverStore {
        &self.store
    }

    async fn fetch_ticket(&self, sql: &str, id: TicketId, at: DateTime<Utc>) -> Result<Option<Ticket>> {
        let row = self
            .store
            .query_row(sqlx::query(sql).bind(id.0).bind(at))
            .await?;
        row.as_ref().map(row_to_ticket).transpose()
    }
}

fn row_to_ticket(row: &PgRow) -> Result<Ticket> {
    Ok(Ticket {
        id: TicketId(decode(row, "id")?),
        event_id: decode(row, "event_id")?,
        email: decode(row, "email")?,
        status: TicketStatus::parse(&decode::<String>(row, "status")?)?,
        state: ValidationState::parse(&decode::<String>(row, "state")?)?,
        gift_claimed_at: decode(row, "gift_claimed_at")?,
        expires_at: decode(row, "expires_at")?,
        signature: decode(row, "hmac_signature")?,
        qr_code_url: decode(row, "qr_code_url")?,
        created_at: decode(row, "created_at")?,
        updated_at: decode(row, "updated_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId(decode(row, "id")?),
        event_id: decode(row, "event_id")?,
        email: decode(row, "email")?,
        status: OrderStatus::parse(&decode::<String>(row, "status")?)?,
        expires_at: decode(row, "expires_at")?,
        created_at: decode(row, "created_at")?,
    })
}

fn decode<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Decode(format!("{column}: {e}")).into())
}

impl TicketRepository for PostgresRepository {
    async fn create_ticket(&self, ticket: NewTicket, codec: &SignatureCodec) -> Result<Ticket> {
        let mut tx = self.store.begin().await?;

        let (id,): (i64,) = self
            .store
            .bounded(
                sqlx::query_as(
                    r"
                    INSERT INTO invitees (event_id, email, status, state, expires_at)
                    VALUES ($1, $2, 'pending', 'pending', $3)
                    RETURNING id
                    ",
                )
                .bind(ticket.event_id)
                .bind(&ticket.email)
                .bind(ticket.expires_at)
                .fetch_one(&mut *tx),
            )
            .await?;

        let id = TicketId(id);
        let sql = format!(
            "UPDATE invitees SET hmac_signature = $2, updated_at = now() \
             WHERE id = $1 RETURNING {TICKET_COLUMNS}"
        );
        let row = self
            .store
            .bounded(
                sqlx::query(&sql)
                    .bind(id.0)
                    .bind(codec.sign(id))
                    .fetch_one(&mut *tx),
            )
            .await?;

        self.store.bounded(tx.commit()).await?;

        row_to_ticket(&row)
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM invitees WHERE id = $1");
        let row = self.store.query_row(sqlx::query(&sql).bind(id.0)).await?;
        row.as_ref().map(row_to_ticket).transpose()
    }

    async fn find_by_signature(&self, signature: &str) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM invitees WHERE hmac_signature = $1");
        let row = self
            .store
            .query_row(sqlx::query(&sql).bind(signature))
            .await?;
        row.as_ref().map(row_to_ticket).transpose()
    }

    async fn claim_gift(&self, id: TicketId, at: DateTime<Utc>) -> Result<Option<Ticket>> {
        let sql = format!(
            r"
            UPDATE invitees
            SET state = 'checked_in', gift_claimed_at = $2, updated_at = $2
            WHERE id = $1
              AND gift_claimed_at IS NULL
              AND state <> 'denied'
              AND status = 'pending'
            RETURNING {TICKET_COLUMNS}
            "
        );
        self.fetch_ticket(&sql, id, at).await
    }

    async fn mark_checked_in(&self, id: TicketId, at: DateTime<Utc>) -> Result<Option<Ticket>> {
        let sql = format!(
            r"
            UPDATE invitees
            SET state = 'checked_in', updated_at = $2
            WHERE id = $1 AND state = 'pending' AND status = 'pending'
            RETURNING {TICKET_COLUMNS}
            "
        );
        self.fetch_ticket(&sql, id, at).await
    }

    async fn mark_denied(&self, id: TicketId, at: DateTime<Utc>) -> Result<Option<Ticket>> {
        let sql = format!(
            r"
            UPDATE invitees
            SET state = 'denied', updated_at = $2
            WHERE id = $1 AND state = 'pending'
            RETURNING {TICKET_COLUMNS}
            "
        );
        self.fetch_ticket(&sql, id, at).await
    }

    async fn record_reprint(
        &self,
        request: &ReprintRequest,
        signature: &str,
    ) -> Result<Option<Ticket>> {
        let mut tx = self.store.begin().await?;

        let sql = format!(
            "UPDATE invitees SET hmac_signature = $2, updated_at = $3 \
             WHERE id = $1 RETURNING {TICKET_COLUMNS}"
        );
        let Some(row) = self
            .store
            .bounded(
                sqlx::query(&sql)
                    .bind(request.ticket_id.0)
                    .bind(signature)
                    .bind(request.created_at)
                    .fetch_optional(&mut *tx),
            )
            .await?
        else {
            self.store.bounded(tx.rollback()).await?;
            return Ok(None);
        };

        self.store
            .bounded(
                sqlx::query(
                    r"
                    INSERT INTO reprint_requests (invitee_id, requested_by, created_at)
                    VALUES ($1, $2, $3)
                    ",
                )
                .bind(request.ticket_id.0)
                .bind(&request.requested_by.0)
                .bind(request.created_at)
                .execute(&mut *tx),
            )
            .await?;

        self.store.bounded(tx.commit()).await?;

        row_to_ticket(&row).map(Some)
    }

    async fn expired_tickets(&self, now: DateTime<Utc>) -> Result<Vec<TicketId>> {
        let rows = self
            .store
            .query(
                sqlx::query(
                    r"
                    SELECT id FROM invitees
                    WHERE status = 'pending' AND state = 'pending' AND expires_at < $1
                    ORDER BY expires_at
                    ",
                )
                .bind(now),
            )
            .await?;

        rows.into_iter()
            .map(|row| decode(&row, "id").map(TicketId))
            .collect()
    }

    async fn expire_ticket(&self, id: TicketId) -> Result<bool> {
        let done = self
            .store
            .exec(
                sqlx::query(
                    "UPDATE invitees SET status = 'expired', updated_at = now() \
                     WHERE id = $1 AND status = 'pending' AND state = 'pending'",
                )
                .bind(id.0),
            )
            .await?;
        Ok(done.rows_affected == 1)
    }
}

impl OrderRepository for PostgresRepository {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let sql = format!(
            "INSERT INTO orders (event_id, email, status, expires_at) \
             VALUES ($1, $2, 'pending', $3) RETURNING {ORDER_COLUMNS}"
        );
        let row = self
            .store
            .query_row(
                sqlx::query(&sql)
                    .bind(order.event_id)
                    .bind(&order.email)
                    .bind(order.expires_at),
            )
            .await?
            .ok_or_else(|| StoreError::Decode("INSERT returned no row".into()))?;
        row_to_order(&row)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = self.store.query_row(sqlx::query(&sql).bind(id.0)).await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn expired_orders(&self, now: DateTime<Utc>) -> Result<Vec<OrderId>> {
        let rows = self
            .store
            .query(
                sqlx::query(
                    r"
                    SELECT id FROM orders
                    WHERE status = 'pending' AND expires_at < $1
                    ORDER BY expires_at
                    ",
                )
                .bind(now),
            )
            .await?;

        rows.into_iter()
            .map(|row| decode(&row, "id").map(OrderId))
            .collect()
    }

    async fn expire_order(&self, id: OrderId) -> Result<bool> {
        let done = self
            .store
            .exec(
                sqlx::query("UPDATE orders SET status = 'expired' WHERE id = $1 AND status = 'pending'")
                    .bind(id.0),
            )
            .await?;
        Ok(done.rows_affected == 1)
    }
}
