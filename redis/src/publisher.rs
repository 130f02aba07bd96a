//! Check-in notifications over Redis pub/sub.

use eventpass_core::error::{EventPassError, Result};
use eventpass_core::providers::CheckInPublisher;
use eventpass_core::Ticket;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Channel live dashboards subscribe to.
pub const CHECK_INS_CHANNEL: &str = "check-ins";

/// Publishes each checked-in ticket as JSON.
#[derive(Clone)]
pub struct RedisCheckInPublisher {
    conn_manager: ConnectionManager,
    channel: String,
    command_timeout: Duration,
}

impl RedisCheckInPublisher {
    /// Publish on [`CHECK_INS_CHANNEL`].
    #[must_use]
    pub fn new(conn_manager: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            conn_manager,
            channel: CHECK_INS_CHANNEL.to_string(),
            command_timeout,
        }
    }

    /// Publish on a different channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }
}

impl CheckInPublisher for RedisCheckInPublisher {
    async fn publish_check_in(&self, ticket: &Ticket) -> Result<()> {
        let payload = serde_json::to_string(ticket)
            .map_err(|e| EventPassError::Publish(format!("Failed to serialize ticket: {e}")))?;

        let mut conn = self.conn_manager.clone();
        let receivers: i64 = tokio::time::timeout(
            self.command_timeout,
            conn.publish(&self.channel, payload),
        )
        .await
        .map_err(|_| EventPassError::Timeout(self.command_timeout))?
        .map_err(|e| EventPassError::Publish(format!("Failed to publish check-in: {e}")))?;

        tracing::debug!(
            ticket_id = %ticket.id,
            channel = %self.channel,
            receivers,
            "Check-in published"
        );

        Ok(())
    }
}
