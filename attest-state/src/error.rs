//! Holds error types for attest-state.

use attest_fetch::chain::source::LogSourceError;

/// Errors raised by the storage ports.
///
/// Treated as fatal to the batch being synchronized, partial writes risk
/// checkpoint/data divergence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Error from the underlying sqlx driver.
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Type for errors without an underlying source.
    #[error("Store error: {0}")]
    Custom(String),
}

/// Errors raised while synchronizing a batch for one source.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The log source was unreachable or errored for the requested range.
    #[error("Fetch error: {0}")]
    Fetch(#[from] LogSourceError),

    /// The relational store rejected a read or write.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from a Tokio JoinHandle.
    #[error("Join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    /// Type for errors without an underlying source.
    #[error("Sync error: {0}")]
    Custom(String),
}

impl SyncError {
    /// Returns the error kind label used by the error metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Fetch(_) => "fetch",
            SyncError::Store(_) => "persistence",
            SyncError::JoinError(_) => "join",
            SyncError::Custom(_) => "other",
        }
    }
}

/// Errors raised by a projection handler applying a decoded event.
///
/// Logged and counted by the synchronizer; the event is marked applied
/// regardless so one poison event cannot stall the stream.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The event payload did not carry the arguments the handler expects.
    #[error("Malformed event payload: {0}")]
    Malformed(String),

    /// Error from the storage port.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
