use crate::abi::AbiError;
use thiserror::Error;

/// Classification of JSON-RPC errors returned by an endpoint.
///
/// - Client errors mean the request itself was wrong
/// - Provider errors and rate limits are the endpoint's problem; another endpoint may succeed
/// - Execution errors are reverts of the called contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorCategory {
    /// Invalid request, method not found, invalid params.
    ClientError,
    /// Internal error, server error.
    ProviderError,
    /// Rate limiting at JSON-RPC level (-32005).
    RateLimit,
    /// Malformed request reported by the endpoint (-32700).
    ParseError,
    /// Execution errors (reverts, out of gas, etc.).
    ExecutionError,
}

impl RpcErrorCategory {
    /// Classifies a JSON-RPC error code and message into a category.
    ///
    /// In the -32000 to -32099 range the message decides between an execution error and a
    /// provider error. Code 3 is the geth convention for reverts that carry return data.
    #[must_use]
    pub fn from_code_and_message(code: i32, message: &str) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32602..=-32600 => Self::ClientError,
            -32005 => Self::RateLimit,
            3 => Self::ExecutionError,
            -32099..=-32000 => {
                let message_lower = message.to_lowercase();
                if message_lower.contains("execution reverted") ||
                    message_lower.contains("revert") ||
                    message_lower.contains("out of gas") ||
                    message_lower.contains("invalid opcode")
                {
                    Self::ExecutionError
                } else {
                    Self::ProviderError
                }
            }
            _ => Self::ProviderError,
        }
    }

    /// Returns `true` if another attempt (on this or another endpoint) may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ProviderError)
    }
}

/// Errors raised by the chain reader.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReaderError {
    /// Request exceeded the per-call timeout.
    #[error("request timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-2xx HTTP status: status code and (truncated) body.
    #[error("HTTP error {0}: {1}")]
    HttpError(u16, String),

    /// JSON-RPC error object: code and message.
    #[error("RPC error {0}: {1}")]
    RpcError(i32, String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("concurrency limit reached: {0}")]
    ConcurrencyLimit(String),

    #[error("ABI decode failed: {0}")]
    Abi(#[from] AbiError),

    /// An endpoint returned too few blocks to measure an interval.
    #[error("endpoint {endpoint} yielded {usable} usable blocks")]
    InsufficientBlocks { endpoint: String, usable: usize },

    /// Neither the caller nor the built-in defaults supplied an endpoint.
    #[error("no endpoints configured for network '{network}'")]
    NoEndpoints { network: String },

    /// Every endpoint was tried and failed.
    #[error("all {attempted} endpoints failed, last error: {last_error}")]
    AllEndpointsFailed { attempted: usize, last_error: Box<ReaderError> },
}

impl ReaderError {
    #[must_use]
    pub fn rpc_category(&self) -> Option<RpcErrorCategory> {
        match self {
            Self::RpcError(code, message) => {
                Some(RpcErrorCategory::from_code_and_message(*code, message))
            }
            _ => None,
        }
    }

    /// Returns `true` if the error is a contract execution revert, including when it was the
    /// last error of an exhausted endpoint list.
    #[must_use]
    pub fn is_execution_revert(&self) -> bool {
        match self {
            Self::AllEndpointsFailed { last_error, .. } => last_error.is_execution_revert(),
            _ => self.rpc_category() == Some(RpcErrorCategory::ExecutionError),
        }
    }

    /// Returns `true` if the error is transient and the request should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::ConnectionFailed(_) => true,
            Self::HttpError(status, _) => (500..=599).contains(status) || *status == 429,
            Self::RpcError(_, _) => self.rpc_category().is_some_and(|cat| cat.is_transient()),
            _ => false,
        }
    }
}
