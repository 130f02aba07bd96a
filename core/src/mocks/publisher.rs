//! Mock check-in publisher for testing.

use crate::error::{EventPassError, Result};
use crate::providers::CheckInPublisher;
use crate::types::{Ticket, TicketId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Publisher that records every published ticket id in order.
#[derive(Debug, Clone, Default)]
pub struct MockCheckInPublisher {
    published: Arc<Mutex<Vec<TicketId>>>,
    fail_next: Arc<AtomicBool>,
}

impl MockCheckInPublisher {
    /// Create an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next publish fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Ticket ids published so far.
    #[must_use]
    pub fn published(&self) -> Vec<TicketId> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CheckInPublisher for MockCheckInPublisher {
    async fn publish_check_in(&self, ticket: &Ticket) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EventPassError::Publish("injected failure".into()));
        }

        self.published
            .lock()
            .map_err(|_| EventPassError::Publish("Mutex lock failed".into()))?
            .push(ticket.id);

        Ok(())
    }
}
