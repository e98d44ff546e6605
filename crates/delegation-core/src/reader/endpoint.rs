use bytes::Bytes;
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{http_client::HttpClient, ReaderError};
use crate::types::{format_quantity, parse_quantity, Address, JsonRpcRequest, JsonRpcResponse};

/// One JSON-RPC endpoint. Every call is bounded by the endpoint's timeout, retries included.
pub struct RpcEndpoint {
    url: String,
    http: Arc<HttpClient>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl RpcEndpoint {
    #[must_use]
    pub fn new(url: impl Into<String>, http: Arc<HttpClient>, timeout: Duration) -> Self {
        Self { url: url.into(), http, timeout, next_id: AtomicU64::new(1) }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends a JSON-RPC request and returns its `result` (`null` if absent).
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::Timeout` if the call exceeds the endpoint timeout,
    /// `ReaderError::RpcError` if the response carries an error object,
    /// `ReaderError::InvalidResponse` if the body is not a JSON-RPC response, or any
    /// transport error from [`HttpClient::post_json`].
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ReaderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, Some(params), json!(id));
        let body = serde_json::to_vec(&request)
            .map_err(|e| ReaderError::InvalidRequest(format!("failed to serialize request: {e}")))?;

        tracing::trace!(endpoint = %self.url, method, id, "sending request");

        let bytes = tokio::time::timeout(
            self.timeout,
            self.http.post_json(&self.url, Bytes::from(body), self.timeout),
        )
        .await
        .map_err(|_| ReaderError::Timeout)??;

        let response: JsonRpcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ReaderError::InvalidResponse(format!("invalid JSON: {e}")))?;

        if let Some(error) = response.error {
            return Err(ReaderError::RpcError(error.code, error.message));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// `eth_call` against the latest block. Returns the raw return data.
    ///
    /// # Errors
    /// See [`request`](Self::request); a non-hex result is `ReaderError::InvalidResponse`.
    pub async fn eth_call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ReaderError> {
        let params = json!([{ "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) }, "latest"]);
        let result = self.request("eth_call", params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ReaderError::InvalidResponse(format!("eth_call result: {result}")))?;
        let digits = raw
            .strip_prefix("0x")
            .ok_or_else(|| ReaderError::InvalidResponse(format!("eth_call result: {raw}")))?;
        hex::decode(digits)
            .map_err(|e| ReaderError::InvalidResponse(format!("eth_call result: {e}")))
    }

    /// `eth_blockNumber`.
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn block_number(&self) -> Result<u64, ReaderError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        Self::quantity(&result, "eth_blockNumber")
    }

    /// Timestamp of block `number`, or of the latest block when `None`. Returns `Ok(None)` if
    /// the endpoint does not know the block.
    ///
    /// # Errors
    /// See [`request`](Self::request).
    pub async fn block_timestamp(&self, number: Option<u64>) -> Result<Option<u64>, ReaderError> {
        let tag = number.map_or_else(|| "latest".to_string(), format_quantity);
        let block = self.request("eth_getBlockByNumber", json!([tag, false])).await?;
        if block.is_null() {
            return Ok(None);
        }
        let timestamp = block.get("timestamp").ok_or_else(|| {
            ReaderError::InvalidResponse("block without timestamp".to_string())
        })?;
        Self::quantity(timestamp, "timestamp").map(Some)
    }

    fn quantity(value: &Value, field: &str) -> Result<u64, ReaderError> {
        let raw = value
            .as_str()
            .ok_or_else(|| ReaderError::InvalidResponse(format!("{field}: expected string")))?;
        parse_quantity(raw).map_err(|e| ReaderError::InvalidResponse(format!("{field}: {e}")))
    }
}
