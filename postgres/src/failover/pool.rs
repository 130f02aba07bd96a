//! `PgPool` surface of the failover store.

use super::{FailoverConfig, FailoverMode, FailoverStore, HealthProbe, Role};
use crate::error::StoreError;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Transaction};

/// Outcome of a statement without a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows matched by the statement
    pub rows_affected: u64,
}

/// All rows of a query.
#[derive(Debug, Default)]
pub struct Rows(pub Vec<PgRow>);

impl Rows {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the query returned nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Rows {
    type Item = PgRow;
    type IntoIter = std::vec::IntoIter<PgRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A statement built with `sqlx::query(..).bind(..)`.
pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

impl FailoverStore<PgPool> {
    /// Open both pools and start on the primary if it answers, otherwise on
    /// the replica.
    ///
    /// Pools connect lazily, so a primary that is down at startup does not
    /// prevent the process from coming up on the replica.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if neither database answers, or
    /// [`StoreError::Database`] if a URL is malformed.
    pub async fn connect_hot(
        primary_url: &str,
        replica_url: &str,
        config: FailoverConfig,
    ) -> Result<Self, StoreError> {
        let primary = pool_options(&config).connect_lazy(primary_url)?;
        let replica = pool_options(&config).connect_lazy(replica_url)?;

        let store = Self::new(FailoverMode::HotStandby { primary, replica }, config);

        if store.probe_primary().await == Some(true) {
            tracing::info!("Hot standby ready on primary");
            return Ok(store);
        }

        store.switch_to(Role::Replica).await;
        store.ping().await.map_err(|e| {
            StoreError::Unavailable(format!("primary and replica both unreachable: {e}"))
        })?;

        tracing::warn!("Primary unreachable at startup, serving from replica");
        Ok(store)
    }

    /// Connect to the primary, or to `fallback_url` if the primary does not
    /// answer. The choice is final.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if neither database answers.
    pub async fn connect_cold(
        primary_url: &str,
        fallback_url: &str,
        config: FailoverConfig,
    ) -> Result<Self, StoreError> {
        let primary_err = match connect_checked(primary_url, &config).await {
            Ok(active) => {
                tracing::info!("Cold fallback mode, connected to primary");
                return Ok(Self::new(
                    FailoverMode::ColdFallback {
                        active,
                        role: Role::Primary,
                    },
                    config,
                ));
            }
            Err(e) => e,
        };

        tracing::warn!(error = %primary_err, "Primary unreachable, connecting to fallback");

        let active = connect_checked(fallback_url, &config).await.map_err(|e| {
            StoreError::Unavailable(format!("primary: {primary_err}; fallback: {e}"))
        })?;

        Ok(Self::new(
            FailoverMode::ColdFallback {
                active,
                role: Role::Replica,
            },
            config,
        ))
    }

    /// Connect to one database with no standby.
    ///
    /// # Errors
    ///
    /// Returns error if the database does not answer.
    pub async fn connect_single(url: &str, config: FailoverConfig) -> Result<Self, StoreError> {
        let pool = connect_checked(url, &config).await?;
        Ok(Self::single(pool, config))
    }

    /// Single-database store, never swapped.
    #[must_use]
    pub fn single(pool: PgPool, config: FailoverConfig) -> Self {
        Self::new(
            FailoverMode::ColdFallback {
                active: pool,
                role: Role::Primary,
            },
            config,
        )
    }

    /// Run a statement on the active database.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails or exceeds the deadline.
    pub async fn exec(&self, query: PgQuery<'_>) -> Result<ExecResult, StoreError> {
        let pool = self.active_connection().await;
        let done = self.bounded(query.execute(&pool)).await?;
        Ok(ExecResult {
            rows_affected: done.rows_affected(),
        })
    }

    /// Fetch every row.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or exceeds the deadline.
    pub async fn query(&self, query: PgQuery<'_>) -> Result<Rows, StoreError> {
        let pool = self.active_connection().await;
        self.bounded(query.fetch_all(&pool)).await.map(Rows)
    }

    /// Fetch at most one row.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or exceeds the deadline.
    pub async fn query_row(&self, query: PgQuery<'_>) -> Result<Option<PgRow>, StoreError> {
        let pool = self.active_connection().await;
        self.bounded(query.fetch_optional(&pool)).await
    }

    /// Start a transaction on the active database.
    ///
    /// The transaction stays on that database even if a swap happens before
    /// it commits.
    ///
    /// # Errors
    ///
    /// Returns error if no connection is available in time.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let pool = self.active_connection().await;
        self.bounded(pool.begin()).await
    }
}

fn pool_options(config: &FailoverConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.query_timeout)
}

/// Connect and verify with one probe.
async fn connect_checked(url: &str, config: &FailoverConfig) -> Result<PgPool, StoreError> {
    let pool = tokio::time::timeout(config.query_timeout, pool_options(config).connect(url))
        .await
        .map_err(|_| StoreError::Timeout(config.query_timeout))??;

    tokio::time::timeout(config.query_timeout, pool.probe())
        .await
        .map_err(|_| StoreError::Timeout(config.query_timeout))??;

    Ok(pool)
}
