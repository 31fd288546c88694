//! Raw and decoded log entry types.

use serde::{Deserialize, Serialize};

use crate::jsonrpc::response::RawLogResponse;

/// A raw log entry pulled from the chain log source.
///
/// `(transaction_id, sequence_in_transaction)` is globally unique and is the
/// natural key used for idempotent persistence downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    /// Emitting contract address, normalized to lowercase.
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

impl From<RawLogResponse> for RawLog {
    fn from(response: RawLogResponse) -> Self {
        RawLog {
            address: response.address.to_lowercase(),
            topics: response.topics,
            data: response.data,
            position: response.position,
            transaction_id: response.transaction_id,
            sequence_in_transaction: response.sequence_in_transaction,
        }
    }
}

/// A log entry decoded against a registered event schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Fully qualified event name, e.g. `endorsement.created`.
    pub name: String,
    /// Emitting contract address.
    pub source_address: String,
    /// Block position the event was emitted at.
    pub position: u64,
    /// Id of the emitting transaction.
    pub transaction_id: String,
    /// Index of the log within its transaction.
    pub sequence_in_transaction: u64,
    /// Named, typed event arguments.
    pub args: serde_json::Map<String, serde_json::Value>,
}
