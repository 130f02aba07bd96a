//! # EventPass Core
//!
//! Signed event tickets and race-free venue check-in.
//!
//! ## Components
//!
//! - **`SignatureCodec`**: HMAC-SHA256 signatures over ticket ids, doubling
//!   as the QR payload
//! - **`DedupGate`**: collapses bursts of identical scans into one attempt
//! - **`CheckInStateMachine`**: scan and validation flows over conditional
//!   writes, so each ticket is admitted and gifted at most once
//! - **`TicketIssuer`**: issuance and operator reprints
//! - **`ExpirySweeper`**: periodic expiry of stale tickets and orders
//!
//! Storage, cache and broker access sit behind the traits in [`providers`].
//! The `test-utils` feature (on by default) adds in-memory [`mocks`].
//!
//! ## Scan flow
//!
//! ```text
//! token → DedupGate → resolve → verify → conditional UPDATE → publish
//! ```
//!
//! ## Example
//!
//! ```
//! use eventpass_core::checkin::{CheckInConfig, CheckInStateMachine, ScanOutcome};
//! use eventpass_core::environment::SystemClock;
//! use eventpass_core::issuance::TicketIssuer;
//! use eventpass_core::mocks::{MockCheckInPublisher, MockDedupGate, MockRepository};
//! use eventpass_core::signature::{HmacSecret, SignatureCodec};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> eventpass_core::Result<()> {
//! let repository = Arc::new(MockRepository::new());
//! let codec = Arc::new(SignatureCodec::new(HmacSecret::new("secret"))?);
//! let clock = Arc::new(SystemClock);
//!
//! let issuer = TicketIssuer::new(repository.clone(), codec.clone(), clock.clone());
//! let ticket = issuer.issue(1, "guest@example.com").await?;
//!
//! let machine = CheckInStateMachine::new(
//!     repository,
//!     Arc::new(MockDedupGate::new()),
//!     Arc::new(MockCheckInPublisher::new()),
//!     codec,
//!     clock,
//!     CheckInConfig::default(),
//! );
//!
//! let token = ticket.signature.unwrap_or_default();
//! assert!(matches!(machine.scan(&token).await?, ScanOutcome::CheckedIn(_)));
//! assert!(matches!(machine.scan(&token).await?, ScanOutcome::TooManyRequests));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod checkin;
pub mod environment;
pub mod error;
pub mod issuance;
pub mod providers;
pub mod signature;
pub mod sweeper;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use checkin::{CheckInConfig, CheckInOutcome, CheckInStateMachine, ScanOutcome, Verdict};
pub use error::{EventPassError, Result};
pub use issuance::TicketIssuer;
pub use signature::{HmacSecret, SignatureCodec};
pub use sweeper::{ExpirySweeper, SweepReport, SweeperConfig};
pub use types::{
    NewOrder, NewTicket, Operator, OperatorId, Order, OrderId, OrderStatus, ReprintRequest,
    Ticket, TicketId, TicketStatus, ValidationState,
};
