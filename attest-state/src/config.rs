//! Holds config data for the attest-state sync services.

/// Holds config data for the per-source sync workers.
#[derive(Debug, Clone)]
pub struct SyncServiceConfig {
    /// First position ever indexed when no checkpoint exists for a source.
    pub start_position: u64,
    /// Maximum width of the log range synchronized per cycle.
    pub batch_size: u64,
    /// Poll interval between sync cycles.
    pub poll_interval: std::time::Duration,
}

impl SyncServiceConfig {
    /// Returns a new instance of [`SyncServiceConfig`].
    pub fn new(
        start_position: Option<u64>,
        batch_size: Option<u64>,
        poll_interval_secs: Option<u64>,
    ) -> Self {
        SyncServiceConfig {
            start_position: start_position.unwrap_or(0),
            batch_size: batch_size.unwrap_or(100).max(1),
            poll_interval: std::time::Duration::from_secs(poll_interval_secs.unwrap_or(15)),
        }
    }
}

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}
