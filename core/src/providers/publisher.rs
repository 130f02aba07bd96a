//! Check-in notification publisher.

use crate::error::Result;
use crate::types::Ticket;

/// Publishes successful check-ins to live dashboards.
///
/// Delivery is at-least-once; consumers must be idempotent on ticket id.
pub trait CheckInPublisher: Send + Sync {
    /// Publish the updated ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the message could not be handed to the broker.
    fn publish_check_in(
        &self,
        ticket: &Ticket,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
