//! HTTP handlers.

pub mod checkin;
pub mod invitees;
