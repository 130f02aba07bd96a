//! Provider traits for the check-in core.
//!
//! The core never talks to Redis or Postgres directly. Each external
//! collaborator sits behind one of these traits and is injected at
//! construction time.

pub mod dedup;
pub mod publisher;
pub mod repository;

pub use dedup::{Claim, DedupGate};
pub use publisher::CheckInPublisher;
pub use repository::{OrderRepository, TicketRepository};
