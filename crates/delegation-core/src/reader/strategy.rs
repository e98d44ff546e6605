//! Endpoint combinators.
//!
//! [`first_success`] walks the endpoint list in priority order and stops at the first success.
//! [`fan_out`] runs the operation against every endpoint concurrently and hands back each
//! endpoint's outcome for the caller to aggregate.

use futures_util::future::join_all;
use std::{future::Future, time::Duration};
use tracing::{debug, trace, warn};

use super::{endpoint::RpcEndpoint, ReaderError};

/// Tries `op` against each endpoint in order until one succeeds.
///
/// An execution revert ends the walk: contract state is the same on every node, so the
/// revert is returned as-is instead of being masked by later transport failures.
///
/// # Errors
///
/// Returns the revert, `ReaderError::AllEndpointsFailed` carrying the number of attempts and
/// the last endpoint's error, or `ReaderError::NoEndpoints` if `endpoints` is empty.
pub async fn first_success<'a, T, F, Fut>(
    network: &str,
    endpoints: &'a [RpcEndpoint],
    mut op: F,
) -> Result<T, ReaderError>
where
    F: FnMut(&'a RpcEndpoint) -> Fut,
    Fut: Future<Output = Result<T, ReaderError>>,
{
    let mut last_error = None;

    for endpoint in endpoints {
        match op(endpoint).await {
            Ok(value) => {
                trace!(network, endpoint = %endpoint.url(), "endpoint succeeded");
                return Ok(value);
            }
            Err(e) if e.is_execution_revert() => {
                debug!(network, endpoint = %endpoint.url(), error = %e, "execution reverted");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    network,
                    endpoint = %endpoint.url(),
                    error = %e,
                    transient = e.is_transient(),
                    "endpoint failed, trying next"
                );
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => {
            Err(ReaderError::AllEndpointsFailed { attempted: endpoints.len(), last_error: Box::new(e) })
        }
        None => Err(ReaderError::NoEndpoints { network: network.to_string() }),
    }
}

/// Runs `op` against every endpoint concurrently and returns `(url, outcome)` pairs in
/// endpoint order. Each endpoint gets its own `deadline`; one that overruns yields
/// `ReaderError::Timeout` without discarding the others' results.
pub async fn fan_out<'a, T, F, Fut>(
    endpoints: &'a [RpcEndpoint],
    deadline: Duration,
    op: F,
) -> Vec<(&'a str, Result<T, ReaderError>)>
where
    F: Fn(&'a RpcEndpoint) -> Fut,
    Fut: Future<Output = Result<T, ReaderError>>,
{
    let futures: Vec<_> = endpoints
        .iter()
        .map(|endpoint| {
            let call = tokio::time::timeout(deadline, op(endpoint));
            async move {
                let outcome = call.await.unwrap_or(Err(ReaderError::Timeout));
                (endpoint.url(), outcome)
            }
        })
        .collect();

    join_all(futures).await
}
