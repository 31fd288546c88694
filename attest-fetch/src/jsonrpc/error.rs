//! Hold error types for the JsonRpcConnector and related functionality.

/// General error type for handling JsonRpcConnector errors.
#[derive(Debug, thiserror::Error)]
pub enum JsonRpcConnectorError {
    /// Type for errors without an underlying source.
    #[error("Error: {0}")]
    JsonRpcClientError(String),

    /// Serialization/Deserialization Errors.
    #[error("Error: Serialization/Deserialization Error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Reqwest Based Errors.
    #[error("Error: HTTP Request Error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// Invalid URI Errors.
    #[error("Error: Invalid URI: {0}")]
    InvalidUriError(#[from] http::uri::InvalidUri),

    /// URL Parse Errors.
    #[error("Error: Invalid URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// Error response returned by the log source.
    #[error("Error: RPC Error: {0}")]
    RpcError(#[from] crate::jsonrpc::response::RpcError),
}

impl JsonRpcConnectorError {
    /// Constructor for errors without an underlying source
    pub fn new(msg: impl Into<String>) -> Self {
        JsonRpcConnectorError::JsonRpcClientError(msg.into())
    }
}
