//! Hold error types for the Indexer and related functionality.

use attest_fetch::{chain::error::RegistryError, jsonrpc::error::JsonRpcConnectorError};
use attest_notify::error::DeliveryError;
use attest_state::error::{StoreError, SyncError};

/// Attest indexer errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// Configuration errors.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// JsonRPC connector errors.
    #[error("JsonRPC connector error: {0}")]
    JsonRpcConnectorError(#[from] JsonRpcConnectorError),
    /// Schema registry loading errors.
    #[error("Registry error: {0}")]
    RegistryError(#[from] RegistryError),
    /// Storage errors.
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    /// Sync service errors.
    #[error("Sync error: {0}")]
    SyncError(#[from] SyncError),
    /// Notification fan-out setup errors.
    #[error("Delivery error: {0}")]
    DeliveryError(#[from] DeliveryError),
    /// Metrics exporter setup errors.
    #[error("Metrics exporter error: {0}")]
    MetricsError(String),
    /// Returned from tokio joinhandles.
    #[error("Join handle error: {0}")]
    TokioJoinError(#[from] tokio::task::JoinError),
    /// Custom indexer errors.
    #[error("Misc indexer error: {0}")]
    MiscIndexerError(String),
}
