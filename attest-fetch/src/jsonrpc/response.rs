//! Response types returned by the chain log source's JsonRPC service.

use serde::{Deserialize, Serialize};

/// Error object returned inside a JsonRPC response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human readable error message.
    pub message: String,
    /// Optional structured error data.
    pub data: Option<serde_json::Value>,
}

/// JsonRPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
pub struct RpcResponse<R> {
    /// Request id the response corresponds to.
    pub id: i32,
    /// Result payload, present on success.
    pub result: Option<R>,
    /// Error payload, present on failure.
    pub error: Option<RpcError>,
}

/// Response to a `getheadposition` call.
///
/// The head is the highest position the source has fully committed; log
/// fetches above it are invalid.
#[derive(Debug, Clone, Deserialize)]
pub struct GetHeadPositionResponse {
    /// Highest committed position.
    pub position: u64,
}

/// A single raw log entry as returned by `getlogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogResponse {
    /// Emitting contract address.
    pub address: String,
    /// Log topics; the first topic is the event discriminator.
    pub topics: Vec<String>,
    /// Hex encoded non-indexed argument data.
    pub data: String,
    /// Block position the log was emitted at.
    pub position: u64,
    /// Id of the transaction that emitted the log.
    pub transaction_id: String,
    /// Index of the log within its transaction.
    pub sequence_in_transaction: u64,
}
