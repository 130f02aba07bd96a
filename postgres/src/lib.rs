//! `PostgreSQL` storage for EventPass.
//!
//! - [`FailoverStore`]: primary/replica handle with hot-standby and
//!   cold-fallback modes, every call bounded by a deadline
//! - [`FailoverMonitor`]: health probe loop that drives hot-standby swaps
//! - [`PostgresRepository`]: ticket and order persistence implementing the
//!   `eventpass-core` repository traits through the failover store
//!
//! # Example
//!
//! ```no_run
//! use eventpass_postgres::{FailoverConfig, FailoverMonitor, FailoverStore, PostgresRepository};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! # async fn example() -> Result<(), eventpass_postgres::StoreError> {
//! let store = Arc::new(
//!     FailoverStore::connect_hot(
//!         "postgres://primary/eventpass",
//!         "postgres://replica/eventpass",
//!         FailoverConfig::default(),
//!     )
//!     .await?,
//! );
//!
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//! FailoverMonitor::new(store.clone()).spawn(shutdown_rx);
//!
//! let repository = PostgresRepository::new(store);
//! repository.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod failover;
pub mod repository;

pub use error::StoreError;
pub use failover::{
    ExecResult, FailoverConfig, FailoverMode, FailoverMonitor, FailoverStore, HealthProbe, Role,
    Rows,
};
pub use repository::PostgresRepository;
