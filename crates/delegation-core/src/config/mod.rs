//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `Default` implementations and builder defaults
//! 2. **Config file**: TOML file named by `DELEGATE_INDEXER_CONFIG` (default
//!    `config/config.toml`, optional)
//! 3. **Environment variables**: `DELEGATE_INDEXER__*`, with `__` separating nested fields
//!
//! # Configuration Sections
//!
//! - [`ReaderConfig`]: chain reader timeouts, sampling, quorum TTL and finality margins
//! - [`NetworkConfig`]: extra endpoints per network, keyed by network name
//! - [`StoreConfig`]: ledger database URL
//! - [`LoggingConfig`]: log level and format
//! - [`TokenConfig`]: token standard of the indexed governance token
//!
//! # Example
//!
//! ```toml
//! [reader]
//! request_timeout_seconds = 5
//! quorum_ttl_seconds = 900
//!
//! [networks.mainnet]
//! endpoints = ["https://eth-mainnet.example.com"]
//!
//! [networks.devnet]
//! endpoints = ["http://localhost:8545"]
//! replace_defaults = true
//!
//! [token]
//! standard = "erc721"
//! ```

use crate::{
    events::TokenStandard,
    reader::{HttpClientConfig, NetworkEndpoints, NetworkRegistry, ReaderSettings},
};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, time::Duration};

/// Chain reader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Bound on each endpoint call, retries included. Defaults to `10`.
    pub request_timeout_seconds: u64,
    /// Blocks sampled per endpoint for the interval estimate. Defaults to `10`.
    pub block_sample_size: u64,
    /// Freshness window for cached quorum readings. Defaults to `1800`.
    pub quorum_ttl_seconds: u64,
    pub timestamp_finality_margin_seconds: u64,
    pub block_finality_margin: u64,
    /// Upper bound on in-flight HTTP requests. Defaults to `64`.
    pub max_concurrent_requests: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 10,
            block_sample_size: 10,
            quorum_ttl_seconds: 1800,
            timestamp_finality_margin_seconds: 180,
            block_finality_margin: 15,
            max_concurrent_requests: 64,
        }
    }
}

/// Endpoints for one network, tried after caller-supplied ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Skip the built-in public endpoints for this network.
    #[serde(default)]
    pub replace_defaults: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `sqlite://` URL of the ledger database.
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { database_url: "sqlite://delegation.db?mode=rwc".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub standard: TokenStandard,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reader: ReaderConfig,
    pub networks: HashMap<String, NetworkConfig>,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub token: TokenConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Use `__` as a separator for nested fields (e.g.
    /// `DELEGATE_INDEXER__READER__REQUEST_TIMEOUT_SECONDS=5`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let defaults = ReaderConfig::default();
        let config = Config::builder()
            .set_default("reader.request_timeout_seconds", defaults.request_timeout_seconds)?
            .set_default("reader.block_sample_size", defaults.block_sample_size)?
            .set_default("reader.quorum_ttl_seconds", defaults.quorum_ttl_seconds)?
            .set_default(
                "reader.timestamp_finality_margin_seconds",
                defaults.timestamp_finality_margin_seconds,
            )?
            .set_default("reader.block_finality_margin", defaults.block_finality_margin)?
            .set_default("store.database_url", StoreConfig::default().database_url)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("token.standard", "erc20")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("DELEGATE_INDEXER").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Loads configuration from `config/config.toml`, or the file named by
    /// `DELEGATE_INDEXER_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("DELEGATE_INDEXER_CONFIG")
            .unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.reader.request_timeout_seconds == 0 {
            return Err("Reader request timeout must be greater than 0".to_string());
        }
        if self.reader.block_sample_size < 2 {
            return Err("Block sample size must be at least 2".to_string());
        }
        if self.reader.quorum_ttl_seconds == 0 {
            return Err("Quorum TTL must be greater than 0".to_string());
        }
        if self.reader.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        for (network, cfg) in &self.networks {
            if cfg.replace_defaults && cfg.endpoints.is_empty() {
                return Err(format!("Network {network} replaces defaults but lists no endpoints"));
            }
            for url in &cfg.endpoints {
                if url.trim().is_empty() {
                    return Err(format!("Empty endpoint URL for network: {network}"));
                }
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("Invalid endpoint URL for network {network}: {url}"));
                }
            }
        }

        if !self.store.database_url.starts_with("sqlite:") {
            return Err(format!("Unsupported database URL: {}", self.store.database_url));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }

    #[must_use]
    pub fn reader_settings(&self) -> ReaderSettings {
        ReaderSettings {
            request_timeout: Duration::from_secs(self.reader.request_timeout_seconds),
            block_sample_size: self.reader.block_sample_size,
            quorum_ttl: Duration::from_secs(self.reader.quorum_ttl_seconds),
            timestamp_finality_margin: self.reader.timestamp_finality_margin_seconds,
            block_finality_margin: self.reader.block_finality_margin,
        }
    }

    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            concurrent_limit: self.reader.max_concurrent_requests,
            ..HttpClientConfig::default()
        }
    }

    #[must_use]
    pub fn network_registry(&self) -> NetworkRegistry {
        NetworkRegistry::new(
            self.networks
                .iter()
                .map(|(name, cfg)| {
                    (name.clone(), NetworkEndpoints {
                        endpoints: cfg.endpoints.clone(),
                        replace_defaults: cfg.replace_defaults,
                    })
                })
                .collect(),
        )
    }
}
