//! # EventPass Server
//!
//! HTTP front for venue check-in: scans, signature validation, issuance
//! and operator reprints, backed by `PostgreSQL` with failover and a Redis
//! dedup gate.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod api;
pub mod config;
pub mod error;
pub mod extractors;
pub mod http;
pub mod metrics;

pub use config::{Config, ConfigError, FailoverModeSetting};
pub use error::AppError;
pub use http::{AppState, ProductionState, build_router};
