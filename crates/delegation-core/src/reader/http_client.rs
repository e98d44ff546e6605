use bytes::Bytes;
use reqwest::{Client, ClientBuilder};
use std::{sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::ReaderError;

const MAX_RETRIES: u32 = 2;
const MAX_ERROR_BODY: usize = 256;

/// Concurrency and connection settings for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of in-flight requests across all endpoints.
    pub concurrent_limit: usize,
    /// How long a request may wait for a concurrency permit.
    pub permit_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { concurrent_limit: 64, permit_timeout_ms: 2_000, connect_timeout_ms: 5_000 }
    }
}

/// Shared JSON-RPC transport with semaphore-bounded concurrency.
///
/// Transport errors and 5xx responses are retried twice with exponential backoff
/// (200 ms, 400 ms) before the error is returned.
pub struct HttpClient {
    client: Client,
    permits: Arc<Semaphore>,
    config: HttpClientConfig,
}

/// Holds a permit for the lifetime of one request, including its retries.
struct PermitGuard {
    _permit: OwnedSemaphorePermit,
    semaphore: Arc<Semaphore>,
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        tracing::trace!(available_permits = self.semaphore.available_permits(), "permit released");
    }
}

impl HttpClient {
    /// # Errors
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, ReaderError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// # Errors
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, ReaderError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("delegate-indexer/", env!("CARGO_PKG_VERSION")))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                ReaderError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self { client, permits: Arc::new(Semaphore::new(config.concurrent_limit)), config })
    }

    /// Maps a reqwest error to a message that does not echo the endpoint URL, which may embed
    /// an API key.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_body() || error.is_decode() {
            "response body error".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// POSTs a JSON body to `url` and returns the raw response body.
    ///
    /// # Errors
    ///
    /// - [`ReaderError::Timeout`] if permit acquisition or the request times out
    /// - [`ReaderError::ConcurrencyLimit`] if the semaphore is closed
    /// - [`ReaderError::HttpError`] for non-success HTTP status codes
    /// - [`ReaderError::ConnectionFailed`] once transport retries are exhausted
    pub async fn post_json(
        &self,
        url: &str,
        body: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, ReaderError> {
        let permit = tokio::time::timeout(
            Duration::from_millis(self.config.permit_timeout_ms),
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                available_permits = self.permits.available_permits(),
                "http client permit acquisition timeout"
            );
            ReaderError::Timeout
        })?
        .map_err(|_| ReaderError::ConcurrencyLimit("semaphore closed".to_string()))?;

        let _guard = PermitGuard { _permit: permit, semaphore: Arc::clone(&self.permits) };

        let mut retries = 0;
        loop {
            let result = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .body(body.clone())
                .timeout(timeout)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return response.bytes().await.map_err(ReaderError::Network);
                }
                Ok(response) if response.status().is_server_error() && retries < MAX_RETRIES => {
                    retries += 1;
                    tracing::trace!(status = response.status().as_u16(), retries, "retrying");
                    tokio::time::sleep(Duration::from_millis(100 * (1 << retries))).await;
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let mut text = response.text().await.unwrap_or_default();
                    if text.len() > MAX_ERROR_BODY {
                        let mut cut = MAX_ERROR_BODY;
                        while !text.is_char_boundary(cut) {
                            cut -= 1;
                        }
                        text.truncate(cut);
                        text.push_str("... (truncated)");
                    }
                    return Err(ReaderError::HttpError(status, text));
                }
                Err(_) if retries < MAX_RETRIES => {
                    retries += 1;
                    tokio::time::sleep(Duration::from_millis(100 * (1 << retries))).await;
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(ReaderError::Timeout);
                    }
                    return Err(ReaderError::ConnectionFailed(Self::sanitize_network_error(&e)));
                }
            }
        }
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
