//! Metric recorders for the sync pipeline.
//!
//! Recorded through the `metrics` facade; the daemon installs a Prometheus
//! exporter so an external collector can scrape them.

use metrics::{counter, gauge};

/// Counts one fully applied event, labeled by source and event type.
pub fn record_event_processed(source: &str, event: &str) {
    counter!(
        "attest_events_processed",
        "source" => source.to_string(),
        "event" => event.to_string()
    )
    .increment(1);
}

/// Counts one failed sync cycle, labeled by error kind.
pub fn record_sync_error(kind: &'static str) {
    counter!("attest_sync_errors", "kind" => kind).increment(1);
}

/// Counts one log skipped because it could not be decoded.
pub fn record_decode_skipped(source: &str) {
    counter!("attest_decode_skipped", "source" => source.to_string()).increment(1);
}

/// Counts one projection mutation skipped because its parent entity is
/// missing, or failed outright.
pub fn record_projection_skip(event: &str) {
    counter!("attest_projection_skips", "event" => event.to_string()).increment(1);
}

/// Records the last fully processed position of a source.
pub fn record_last_processed_position(source: &str, position: u64) {
    gauge!(
        "attest_last_processed_position",
        "source" => source.to_string()
    )
    .set(position as f64);
}

/// Counts one webhook delivery attempt, labeled by outcome.
pub fn record_webhook_delivery(outcome: &'static str) {
    counter!("attest_webhook_deliveries", "outcome" => outcome).increment(1);
}
