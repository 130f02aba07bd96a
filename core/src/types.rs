//! Domain types: tickets (invitees), orders and reprint requests.

use crate::error::{EventPassError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ticket primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub i64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse ticket lifecycle, independent of check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Ticket is live
    Pending,
    /// Horizon passed before the ticket was validated
    Expired,
}

impl TicketStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Expired => "expired",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns error if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "expired" => Ok(Self::Expired),
            _ => Err(EventPassError::Storage(format!("Invalid ticket status: {s}"))),
        }
    }
}

/// Validation outcome of a ticket.
///
/// Moves `Pending → CheckedIn` or `Pending → Denied`, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// Not yet validated
    Pending,
    /// Admitted
    CheckedIn,
    /// Rejected for an invalid signature
    Denied,
}

impl ValidationState {
    /// Convert state to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::CheckedIn => "checked_in",
            Self::Denied => "denied",
        }
    }

    /// Parse state from database string.
    ///
    /// # Errors
    ///
    /// Returns error if the string doesn't match a known state.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "checked_in" => Ok(Self::CheckedIn),
            "denied" => Ok(Self::Denied),
            _ => Err(EventPassError::Storage(format!(
                "Invalid validation state: {s}"
            ))),
        }
    }

    /// `true` once the ticket has left `Pending`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Order lifecycle, driven only by the expiry sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order is open
    Pending,
    /// Order lapsed
    Expired,
}

impl OrderStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Expired => "expired",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns error if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "expired" => Ok(Self::Expired),
            _ => Err(EventPassError::Storage(format!("Invalid order status: {s}"))),
        }
    }
}

/// A single admission record tied to one event and one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Primary key
    pub id: TicketId,
    /// Owning event
    pub event_id: i64,
    /// Recipient email
    pub email: String,
    /// Coarse lifecycle
    pub status: TicketStatus,
    /// Validation outcome
    pub state: ValidationState,
    /// When the gift was handed out (set at most once)
    pub gift_claimed_at: Option<DateTime<Utc>>,
    /// Issuance time plus the ticket horizon
    pub expires_at: DateTime<Utc>,
    /// Hex HMAC of the id, stored for lookup by scanned token
    pub signature: Option<String>,
    /// Location of the rendered QR image, managed by the uploader
    pub qr_code_url: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// `true` if the gift has already been handed out.
    #[must_use]
    pub const fn gift_claimed(&self) -> bool {
        self.gift_claimed_at.is_some()
    }

    /// `true` if the sweeper has expired this ticket.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.status == TicketStatus::Expired
    }
}

/// Input for issuing a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    /// Owning event
    pub event_id: i64,
    /// Recipient email
    pub email: String,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
}

/// A purchase order with its own expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Primary key
    pub id: OrderId,
    /// Owning event
    pub event_id: i64,
    /// Buyer email
    pub email: String,
    /// Lifecycle
    pub status: OrderStatus,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Input for creating an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// Owning event
    pub event_id: i64,
    /// Buyer email
    pub email: String,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
}

/// Identity of a back-office operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub String);

/// Authenticated operator, passed explicitly to privileged operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    /// Operator identity
    pub id: OperatorId,
    /// Operator email, for audit logs
    pub email: String,
}

/// Audit record of a ticket re-issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprintRequest {
    /// Ticket that was re-issued
    pub ticket_id: TicketId,
    /// Operator who asked for it
    pub requested_by: OperatorId,
    /// When
    pub created_at: DateTime<Utc>,
}
