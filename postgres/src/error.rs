//! Storage errors.

use eventpass_core::EventPassError;
use std::time::Duration;
use thiserror::Error;

/// Errors from the failover store and repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The query reached the database and failed there.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The call exceeded the query deadline. Outcome unknown.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// Neither database could be reached at startup.
    #[error("No database available: {0}")]
    Unavailable(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row did not decode into a domain value.
    #[error("Invalid row: {0}")]
    Decode(String),
}

impl From<StoreError> for EventPassError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(after) => Self::Timeout(after),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_stays_a_timeout() {
        let err: EventPassError = StoreError::Timeout(Duration::from_secs(5)).into();
        assert_eq!(err, EventPassError::Timeout(Duration::from_secs(5)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_query_errors_are_storage_errors() {
        let err: EventPassError = StoreError::Database(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, EventPassError::Storage(_)));
    }
}
