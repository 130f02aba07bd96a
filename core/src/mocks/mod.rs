//! Mock provider implementations for testing.
//!
//! In-memory implementations of every provider trait, for unit and
//! integration tests. Failure injection hooks let tests exercise the error
//! paths without a database.

pub mod clock;
pub mod dedup;
pub mod publisher;
pub mod repository;

pub use clock::FixedClock;
pub use dedup::MockDedupGate;
pub use publisher::MockCheckInPublisher;
pub use repository::MockRepository;
