//! Prometheus metric descriptions.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `eventpass.scan.outcome{outcome}` - Scans by outcome
//! - `eventpass.validation.verdict{verdict}` - Explicit validations by verdict
//! - `eventpass.tickets.issued` - Tickets issued
//! - `eventpass.publish.failures` - Check-in events that failed to publish
//! - `eventpass.sweeper.expired{kind}` - Tickets and orders expired
//! - `eventpass.sweeper.failures{kind}` - Per-record sweep failures
//! - `eventpass.failover.swaps{to}` - Database role swaps

use metrics::describe_counter;

/// Register metric descriptions. Call once at startup, before any metric
/// is recorded.
pub fn register_metrics() {
    describe_counter!("eventpass.scan.outcome", "Scans by outcome");
    describe_counter!(
        "eventpass.validation.verdict",
        "Explicit signature validations by verdict"
    );
    describe_counter!("eventpass.tickets.issued", "Tickets issued");
    describe_counter!(
        "eventpass.publish.failures",
        "Check-in events that could not be published"
    );
    describe_counter!(
        "eventpass.sweeper.expired",
        "Tickets and orders expired by the sweeper"
    );
    describe_counter!(
        "eventpass.sweeper.failures",
        "Records or listings the sweeper failed to process"
    );
    describe_counter!(
        "eventpass.failover.swaps",
        "Database role swaps by target role"
    );

    tracing::debug!("Metrics registered");
}
