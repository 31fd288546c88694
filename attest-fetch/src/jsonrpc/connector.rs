//! JsonRPC client used to fetch raw logs from the chain log source.

use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;
use url::Url;

use crate::jsonrpc::{
    error::JsonRpcConnectorError,
    response::{GetHeadPositionResponse, RawLogResponse, RpcResponse},
};

/// JsonRPC 2.0 request envelope.
#[derive(Debug, Serialize)]
struct RpcRequest<T> {
    jsonrpc: &'static str,
    id: i32,
    method: &'static str,
    params: T,
}

/// JsonRPC connector to the chain log source.
///
/// Cheap to clone; clones share the request id counter and the underlying
/// connection pool.
#[derive(Debug, Clone)]
pub struct JsonRpcConnector {
    url: Url,
    client: Client,
    id_counter: Arc<AtomicI32>,
    user: Option<String>,
    password: Option<String>,
}

impl JsonRpcConnector {
    /// Creates a new JsonRpcConnector.
    pub fn new(
        url: Url,
        user: Option<String>,
        password: Option<String>,
    ) -> Result<Self, JsonRpcConnectorError> {
        Ok(JsonRpcConnector {
            url,
            client: Client::builder().build()?,
            id_counter: Arc::new(AtomicI32::new(0)),
            user,
            password,
        })
    }

    /// Returns the URL the connector is pointed at.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends a JsonRPC request and parses the response envelope.
    async fn send_request<T: Serialize, R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: T,
    ) -> Result<R, JsonRpcConnectorError> {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let mut builder = self.client.post(self.url.clone()).json(&request);
        if let Some(user) = &self.user {
            builder = builder.basic_auth(user, self.password.as_ref());
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        let envelope: RpcResponse<R> = serde_json::from_slice(&body).map_err(|e| {
            JsonRpcConnectorError::new(format!(
                "Failed to parse JsonRPC response (HTTP {}): {}",
                status, e
            ))
        })?;
        if let Some(error) = envelope.error {
            return Err(JsonRpcConnectorError::RpcError(error));
        }
        envelope.result.ok_or_else(|| {
            JsonRpcConnectorError::new("JsonRPC response contained neither result nor error")
        })
    }

    /// Returns the highest committed position of the log source.
    pub async fn get_head_position(&self) -> Result<GetHeadPositionResponse, JsonRpcConnectorError> {
        self.send_request("getheadposition", ()).await
    }

    /// Returns all logs emitted by `address` within `[from, to]` inclusive.
    pub async fn get_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLogResponse>, JsonRpcConnectorError> {
        self.send_request("getlogs", (address, from, to)).await
    }
}

/// Tries to connect to the log source, returning the URL on success.
///
/// Retries for a short period before giving up, the source may still be
/// starting when the indexer launches.
pub async fn test_source_and_return_url(
    url: &str,
    user: Option<String>,
    password: Option<String>,
) -> Result<Url, JsonRpcConnectorError> {
    let url = Url::parse(url)?;
    let connector = JsonRpcConnector::new(url.clone(), user, password)?;
    let mut attempts = 0;
    loop {
        match connector.get_head_position().await {
            Ok(_) => return Ok(url),
            Err(e) => {
                attempts += 1;
                if attempts >= 5 {
                    return Err(e);
                }
                warn!("Log source not ready at {}: {}. Retrying..", url, e);
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
        }
    }
}
