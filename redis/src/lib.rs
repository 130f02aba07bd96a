//! Redis adapters for EventPass.
//!
//! - [`RedisDedupGate`]: cluster-wide scan dedup via `SET NX PX`
//! - [`RedisCheckInPublisher`]: check-in notifications on a pub/sub channel
//!
//! Both share one `ConnectionManager` per instance and bound every command
//! with a deadline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dedup;
pub mod publisher;

pub use dedup::RedisDedupGate;
pub use publisher::{CHECK_INS_CHANNEL, RedisCheckInPublisher};

use eventpass_core::EventPassError;
use redis::Client;
use redis::aio::ConnectionManager;

/// Open a managed connection to `redis_url`.
///
/// # Errors
///
/// Returns [`EventPassError::Cache`] if the URL is invalid or the server is
/// unreachable.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager, EventPassError> {
    let client = Client::open(redis_url)
        .map_err(|e| EventPassError::Cache(format!("Failed to create Redis client: {e}")))?;

    ConnectionManager::new(client).await.map_err(|e| {
        EventPassError::Cache(format!("Failed to create Redis connection manager: {e}"))
    })
}
