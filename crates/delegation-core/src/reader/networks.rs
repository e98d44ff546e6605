use std::collections::HashMap;

/// Public endpoints used when neither the caller nor configuration supplies one.
#[must_use]
pub fn default_endpoints(network: &str) -> &'static [&'static str] {
    match network {
        "mainnet" => &["https://ethereum-rpc.publicnode.com", "https://eth.llamarpc.com"],
        "sepolia" => &["https://ethereum-sepolia-rpc.publicnode.com", "https://rpc.sepolia.org"],
        "arbitrum" => &["https://arb1.arbitrum.io/rpc", "https://arbitrum-one-rpc.publicnode.com"],
        "optimism" => &["https://mainnet.optimism.io", "https://optimism-rpc.publicnode.com"],
        "base" => &["https://mainnet.base.org", "https://base-rpc.publicnode.com"],
        "polygon" => &["https://polygon-rpc.com", "https://polygon-bor-rpc.publicnode.com"],
        _ => &[],
    }
}

/// Per-network endpoint configuration layered over the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct NetworkEndpoints {
    pub endpoints: Vec<String>,
    /// Drop the built-in defaults for this network instead of appending them.
    pub replace_defaults: bool,
}

/// Resolves the prioritized endpoint list for a network.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    configured: HashMap<String, NetworkEndpoints>,
}

impl NetworkRegistry {
    #[must_use]
    pub fn new(configured: HashMap<String, NetworkEndpoints>) -> Self {
        Self { configured }
    }

    /// Caller-supplied endpoints first, then configured ones, then built-in defaults.
    /// Duplicates (ignoring a trailing `/`) keep their first position.
    #[must_use]
    pub fn resolve(&self, network: &str, caller: &[String]) -> Vec<String> {
        let configured = self.configured.get(network);
        let defaults: &[&str] = match configured {
            Some(c) if c.replace_defaults => &[],
            _ => default_endpoints(network),
        };

        let candidates = caller
            .iter()
            .map(String::as_str)
            .chain(configured.into_iter().flat_map(|c| c.endpoints.iter().map(String::as_str)))
            .chain(defaults.iter().copied());

        let mut resolved: Vec<String> = Vec::new();
        for url in candidates {
            let url = url.trim();
            if url.is_empty() {
                continue;
            }
            let key = url.trim_end_matches('/');
            if !resolved.iter().any(|seen| seen.trim_end_matches('/') == key) {
                resolved.push(url.to_string());
            }
        }
        resolved
    }
}
