//! Log source abstraction over the chain.

use async_trait::async_trait;

use crate::{
    chain::log::RawLog,
    jsonrpc::{connector::JsonRpcConnector, error::JsonRpcConnectorError},
};

/// Errors returned by a [`LogSource`].
///
/// Any failure here aborts the batch being synchronized; partial ranges are
/// never surfaced.
#[derive(Debug, thiserror::Error)]
pub enum LogSourceError {
    /// Error from the JsonRpcConnector.
    #[error("JsonRpcConnector error: {0}")]
    JsonRpcConnectorError(#[from] JsonRpcConnectorError),

    /// Transport failure raised by non-RPC sources.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Read access to an append-only chain log stream.
///
/// A fetch for a given range is atomic from the caller's perspective: it
/// either returns every log in the range or fails as a whole.
#[async_trait]
pub trait LogSource: Send + Sync + 'static {
    /// Returns all logs emitted by `address` within `[from, to]` inclusive,
    /// ordered by `(position, sequence_in_transaction)`.
    async fn fetch_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, LogSourceError>;

    /// Returns the highest committed position of the source.
    async fn head_position(&self) -> Result<u64, LogSourceError>;
}

#[async_trait]
impl LogSource for JsonRpcConnector {
    async fn fetch_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, LogSourceError> {
        let logs = self.get_logs(address, from, to).await?;
        Ok(logs.into_iter().map(RawLog::from).collect())
    }

    async fn head_position(&self) -> Result<u64, LogSourceError> {
        Ok(self.get_head_position().await?.position)
    }
}
