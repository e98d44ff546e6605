use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{
    cache::{QuorumEntry, QuorumKey, ReaderCache},
    endpoint::RpcEndpoint,
    http_client::HttpClient,
    networks::NetworkRegistry,
    strategy::{fan_out, first_success},
    ReaderError,
};
use crate::{
    abi::{self, CLOCK_MODE_SELECTOR, CLOCK_SELECTOR, DECIMALS_SELECTOR, QUORUM_SELECTOR},
    events::TokenStandard,
    types::Address,
};

/// How a governor measures time for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    Timestamp,
    BlockNumber,
}

impl ClockMode {
    /// Parses an ERC-6372 `CLOCK_MODE()` descriptor such as `mode=blocknumber&from=default`.
    #[must_use]
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        descriptor.split('&').find_map(|pair| match pair.trim().split_once('=') {
            Some(("mode", "timestamp")) => Some(Self::Timestamp),
            Some(("mode", "blocknumber")) => Some(Self::BlockNumber),
            _ => None,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::BlockNumber => "blocknumber",
        }
    }
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuorumInfo {
    pub clock_mode: ClockMode,
    pub quorum: u128,
    pub decimals: u8,
}

/// Tunables for [`ChainReader`].
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    /// Bound on every endpoint call, retries included.
    pub request_timeout: Duration,
    /// Consecutive blocks sampled per endpoint for the interval estimate.
    pub block_sample_size: u64,
    pub quorum_ttl: Duration,
    /// Seconds subtracted from the timepoint in timestamp mode.
    pub timestamp_finality_margin: u64,
    /// Blocks subtracted from the timepoint in block-number mode.
    pub block_finality_margin: u64,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            block_sample_size: 10,
            quorum_ttl: Duration::from_secs(30 * 60),
            timestamp_finality_margin: 180,
            block_finality_margin: 15,
        }
    }
}

/// Read-only chain queries over a prioritized, multi-endpoint list.
pub struct ChainReader {
    http: Arc<HttpClient>,
    networks: NetworkRegistry,
    cache: Arc<ReaderCache>,
    settings: ReaderSettings,
}

impl ChainReader {
    #[must_use]
    pub fn new(
        http: Arc<HttpClient>,
        networks: NetworkRegistry,
        cache: Arc<ReaderCache>,
        settings: ReaderSettings,
    ) -> Self {
        Self { http, networks, cache, settings }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ReaderCache> {
        &self.cache
    }

    #[must_use]
    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    fn endpoints(&self, network: &str, caller: &[String]) -> Result<Vec<RpcEndpoint>, ReaderError> {
        let urls = self.networks.resolve(network, caller);
        if urls.is_empty() {
            return Err(ReaderError::NoEndpoints { network: network.to_string() });
        }
        Ok(urls
            .into_iter()
            .map(|url| RpcEndpoint::new(url, Arc::clone(&self.http), self.settings.request_timeout))
            .collect())
    }

    /// `eth_call` at `latest`, falling back through the endpoint list.
    ///
    /// # Errors
    /// Returns `ReaderError::NoEndpoints` or `ReaderError::AllEndpointsFailed`.
    pub async fn call(
        &self,
        network: &str,
        endpoints: &[String],
        to: &Address,
        calldata: &[u8],
    ) -> Result<Vec<u8>, ReaderError> {
        let endpoints = self.endpoints(network, endpoints)?;
        first_success(network, &endpoints, |ep| ep.eth_call(to, calldata)).await
    }

    /// Latest block number, falling back through the endpoint list.
    ///
    /// # Errors
    /// Returns `ReaderError::NoEndpoints` or `ReaderError::AllEndpointsFailed`.
    pub async fn block_number(&self, network: &str, endpoints: &[String]) -> Result<u64, ReaderError> {
        let endpoints = self.endpoints(network, endpoints)?;
        first_success(network, &endpoints, |ep| ep.block_number()).await
    }

    /// Timestamp of the latest block, falling back through the endpoint list.
    ///
    /// # Errors
    /// Returns `ReaderError::NoEndpoints` or `ReaderError::AllEndpointsFailed`.
    pub async fn latest_block_timestamp(
        &self,
        network: &str,
        endpoints: &[String],
    ) -> Result<u64, ReaderError> {
        let endpoints = self.endpoints(network, endpoints)?;
        first_success(network, &endpoints, |ep| async move {
            ep.block_timestamp(None)
                .await?
                .ok_or_else(|| ReaderError::InvalidResponse("latest block missing".to_string()))
        })
        .await
    }

    /// Mean block interval in seconds across every endpoint that could be sampled.
    ///
    /// The raw mean is cached per network for the life of the cache; `precise == false`
    /// rounds it to whole seconds on the way out.
    ///
    /// # Errors
    /// Returns `ReaderError::AllEndpointsFailed` only if no endpoint produced an estimate.
    pub async fn block_interval(
        &self,
        network: &str,
        endpoints: &[String],
        precise: bool,
    ) -> Result<f64, ReaderError> {
        let shape = |seconds: f64| if precise { seconds } else { seconds.round() };

        if let Some(cached) = self.cache.block_interval(network) {
            debug!(network, seconds = cached, "block interval cache hit");
            return Ok(shape(cached));
        }

        let endpoints = self.endpoints(network, endpoints)?;
        let deadline = self.settings.request_timeout.saturating_mul(3);
        let outcomes = fan_out(&endpoints, deadline, |ep| self.sample_interval(ep)).await;

        let mut estimates = Vec::with_capacity(outcomes.len());
        let mut last_error = None;
        for (url, outcome) in outcomes {
            match outcome {
                Ok(seconds) => {
                    debug!(network, endpoint = %url, seconds, "sampled block interval");
                    estimates.push(seconds);
                }
                Err(e) => {
                    warn!(network, endpoint = %url, error = %e, "block interval sampling failed");
                    last_error = Some(e);
                }
            }
        }

        if estimates.is_empty() {
            let last_error = last_error
                .unwrap_or_else(|| ReaderError::NoEndpoints { network: network.to_string() });
            return Err(ReaderError::AllEndpointsFailed {
                attempted: endpoints.len(),
                last_error: Box::new(last_error),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let mean = estimates.iter().sum::<f64>() / estimates.len() as f64;
        self.cache.set_block_interval(network, mean);
        info!(network, seconds = mean, endpoints = estimates.len(), "block interval refreshed");

        Ok(shape(mean))
    }

    /// Mean gap over the most recent `block_sample_size` blocks of one endpoint. Blocks the
    /// endpoint cannot serve are skipped; the gap is normalized by block distance.
    async fn sample_interval(&self, endpoint: &RpcEndpoint) -> Result<f64, ReaderError> {
        let latest = endpoint.block_number().await?;
        let first = latest.saturating_sub(self.settings.block_sample_size.saturating_sub(1));

        let samples = join_all((first..=latest).map(|number| async move {
            (number, endpoint.block_timestamp(Some(number)).await)
        }))
        .await;

        let usable: Vec<(u64, u64)> = samples
            .into_iter()
            .filter_map(|(number, result)| match result {
                Ok(Some(timestamp)) => Some((number, timestamp)),
                Ok(None) => None,
                Err(e) => {
                    debug!(endpoint = %endpoint.url(), block = number, error = %e, "block unavailable");
                    None
                }
            })
            .collect();

        let (Some(&(first_number, first_ts)), Some(&(last_number, last_ts))) =
            (usable.first(), usable.last())
        else {
            return Err(ReaderError::InsufficientBlocks {
                endpoint: endpoint.url().to_string(),
                usable: 0,
            });
        };
        if usable.len() < 2 {
            return Err(ReaderError::InsufficientBlocks {
                endpoint: endpoint.url().to_string(),
                usable: usable.len(),
            });
        }

        let elapsed = last_ts.checked_sub(first_ts).ok_or_else(|| {
            ReaderError::InvalidResponse(format!(
                "block {last_number} is older than block {first_number}"
            ))
        })?;

        #[allow(clippy::cast_precision_loss)]
        Ok(elapsed as f64 / (last_number - first_number) as f64)
    }

    /// The governor's clock mode.
    ///
    /// A governor without `CLOCK_MODE()` (the call reverts or returns no data) is treated as
    /// block-number based, and that answer is cached like a real one.
    ///
    /// # Errors
    /// Transport failures and unrecognized descriptors propagate and are not cached.
    pub async fn clock_mode(&self, network: &str, governor: &Address) -> Result<ClockMode, ReaderError> {
        if let Some(mode) = self.cache.clock_mode(network, governor) {
            debug!(network, governor = %governor, mode = %mode, "clock mode cache hit");
            return Ok(mode);
        }

        let calldata = abi::encode_call(CLOCK_MODE_SELECTOR, &[]);
        let mode = match self.call(network, &[], governor, &calldata).await {
            Ok(data) if data.is_empty() => ClockMode::BlockNumber,
            Ok(data) => {
                let descriptor = abi::decode_string(&data)?;
                ClockMode::from_descriptor(&descriptor).ok_or_else(|| {
                    ReaderError::InvalidResponse(format!("unrecognized clock mode: {descriptor}"))
                })?
            }
            Err(e) if e.is_execution_revert() => {
                debug!(network, governor = %governor, "CLOCK_MODE reverted, assuming blocknumber");
                ClockMode::BlockNumber
            }
            Err(e) => return Err(e),
        };

        self.cache.set_clock_mode(network, *governor, mode);
        Ok(mode)
    }

    /// Quorum and token decimals for a governor, cached for the configured TTL.
    ///
    /// A failed refresh serves the previous entry, however old, with a warning.
    ///
    /// # Errors
    /// Returns the refresh error only when nothing has been cached for this key.
    pub async fn quorum(
        &self,
        network: &str,
        governor: &Address,
        token: &Address,
        standard: TokenStandard,
    ) -> Result<QuorumInfo, ReaderError> {
        let key = QuorumKey {
            network: network.to_string(),
            governor: *governor,
            token: *token,
            standard,
        };

        let cached = self.cache.quorum(&key);
        if let Some(entry) = cached {
            let age = Utc::now().signed_duration_since(entry.fetched_at).to_std().unwrap_or_default();
            if age < self.settings.quorum_ttl {
                debug!(network, governor = %governor, age_secs = age.as_secs(), "quorum cache hit");
                return Ok(entry.info);
            }
        }

        match self.fetch_quorum(network, governor, token, standard).await {
            Ok(info) => {
                self.cache.set_quorum(key, QuorumEntry { info, fetched_at: Utc::now() });
                info!(
                    network,
                    governor = %governor,
                    quorum = %info.quorum,
                    decimals = info.decimals,
                    "quorum refreshed"
                );
                Ok(info)
            }
            Err(e) => match cached {
                Some(entry) => {
                    warn!(
                        network,
                        governor = %governor,
                        error = %e,
                        fetched_at = %entry.fetched_at,
                        "quorum refresh failed, serving stale value"
                    );
                    Ok(entry.info)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch_quorum(
        &self,
        network: &str,
        governor: &Address,
        token: &Address,
        standard: TokenStandard,
    ) -> Result<QuorumInfo, ReaderError> {
        let clock_mode = self.clock_mode(network, governor).await?;

        let timepoint = self.current_timepoint(network, governor, clock_mode).await?;
        let margin = match clock_mode {
            ClockMode::Timestamp => self.settings.timestamp_finality_margin,
            ClockMode::BlockNumber => self.settings.block_finality_margin,
        };
        let timepoint = timepoint.saturating_sub(margin);

        let calldata = abi::encode_call(QUORUM_SELECTOR, &[u128::from(timepoint)]);
        let quorum = abi::decode_uint(&self.call(network, &[], governor, &calldata).await?, 0)?;

        let decimals = if standard.is_fungible() {
            let calldata = abi::encode_call(DECIMALS_SELECTOR, &[]);
            let raw = abi::decode_uint(&self.call(network, &[], token, &calldata).await?, 0)?;
            u8::try_from(raw)
                .map_err(|_| ReaderError::InvalidResponse(format!("decimals out of range: {raw}")))?
        } else {
            0
        };

        Ok(QuorumInfo { clock_mode, quorum, decimals })
    }

    /// The governor's `clock()`, or the chain head in the governor's clock unit if the
    /// accessor is unavailable.
    async fn current_timepoint(
        &self,
        network: &str,
        governor: &Address,
        clock_mode: ClockMode,
    ) -> Result<u64, ReaderError> {
        let calldata = abi::encode_call(CLOCK_SELECTOR, &[]);
        match self.call(network, &[], governor, &calldata).await {
            Ok(data) if !data.is_empty() => {
                let raw = abi::decode_uint(&data, 0)?;
                return u64::try_from(raw)
                    .map_err(|_| ReaderError::InvalidResponse(format!("clock out of range: {raw}")));
            }
            Ok(_) => debug!(network, governor = %governor, "clock() returned no data"),
            Err(e) => debug!(network, governor = %governor, error = %e, "clock() unavailable"),
        }

        match clock_mode {
            ClockMode::Timestamp => self.latest_block_timestamp(network, &[]).await,
            ClockMode::BlockNumber => self.block_number(network, &[]).await,
        }
    }
}
