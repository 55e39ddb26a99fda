//! App state: config and the shared read-through cache.

use std::time::Duration;

use serde_json::Value;
use tricorder_cache::{CachePolicy, ReadThrough, SweepConfig};
use tricorder_core::constants::{
    DEFAULT_LISTEN_ADDR, NEGATIVE_CACHE_TTL_SECS, PRIVATE_ENDPOINTS_ENV, SWEEP_GRACE_SECS,
    SWEEP_INTERVAL_SECS, TX_CACHE_MAX_AGE_SECS,
};
use tricorder_core::error::{Result, TricorderError};
use tricorder_core::traits::Fetcher;
use tricorder_rpc::{parse_endpoint_list, Network, RpcConfig, SolanaRpcClient};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Listen address, `host:port`
    pub addr: String,
    /// RPC endpoint pool
    pub network: Network,
    /// Endpoints for [`Network::Private`]
    pub private_endpoints: Vec<String>,
    /// TTLs for fetched and failed lookups
    pub policy: CachePolicy,
    /// Background sweep schedule
    pub sweep: SweepConfig,
    /// Disables HSTS
    pub debug: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_LISTEN_ADDR.into(),
            network: Network::Public,
            private_endpoints: Vec::new(),
            policy: CachePolicy::default(),
            sweep: SweepConfig::default(),
            debug: false,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from the environment, reading `.env` first.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secs = |name: &str, default: u64| -> Result<Duration> {
            match lookup(name) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| {
                        TricorderError::ConfigError(format!(
                            "{} must be whole seconds, got `{}`",
                            name, raw
                        ))
                    }),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let network = match lookup("TRICORDER_NETWORK") {
            Some(raw) => raw.parse()?,
            None => Network::Public,
        };

        Ok(Self {
            addr: lookup("TRICORDER_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into()),
            network,
            private_endpoints: lookup(PRIVATE_ENDPOINTS_ENV)
                .map(|raw| parse_endpoint_list(&raw))
                .unwrap_or_default(),
            policy: CachePolicy {
                positive_ttl: secs("TRICORDER_TX_TTL_SECS", TX_CACHE_MAX_AGE_SECS)?,
                negative_ttl: secs("TRICORDER_NEGATIVE_TTL_SECS", NEGATIVE_CACHE_TTL_SECS)?,
            },
            sweep: SweepConfig {
                interval: secs("TRICORDER_SWEEP_INTERVAL_SECS", SWEEP_INTERVAL_SECS)?,
                grace: secs("TRICORDER_SWEEP_GRACE_SECS", SWEEP_GRACE_SECS)?,
            },
            debug: lookup("TRICORDER_DEBUG")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }

    /// RPC client settings derived from this config.
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            network: self.network,
            private_endpoints: self.private_endpoints.clone(),
            ..Default::default()
        }
    }
}

/// Shared request state.
pub struct AppState<F: Fetcher = SolanaRpcClient> {
    /// Server configuration
    pub config: ApiConfig,
    /// Deduplicated transaction lookups
    pub reader: ReadThrough<F>,
}

impl AppState<SolanaRpcClient> {
    /// Builds the state with a Solana RPC client for the configured network.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = SolanaRpcClient::with_config(config.rpc_config())?;
        Ok(Self::with_fetcher(config, client))
    }
}

impl<F> AppState<F>
where
    F: Fetcher<Value = Value>,
{
    /// Builds the state around any transaction fetcher.
    pub fn with_fetcher(config: ApiConfig, fetcher: F) -> Self {
        let reader = ReadThrough::with_policy(fetcher, config.policy);
        Self { config, reader }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.addr, "localhost:8080");
        assert_eq!(config.network, Network::Public);
        assert_eq!(config.policy, CachePolicy::default());
        assert_eq!(config.sweep, SweepConfig::default());
        assert!(!config.debug);
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("TRICORDER_ADDR", "0.0.0.0:9000"),
            ("TRICORDER_NETWORK", "private"),
            ("TRICORDER_PRIVATE_ENDPOINTS", "https://a;https://b"),
            ("TRICORDER_TX_TTL_SECS", "120"),
            ("TRICORDER_NEGATIVE_TTL_SECS", "5"),
            ("TRICORDER_SWEEP_GRACE_SECS", "30"),
            ("TRICORDER_DEBUG", "true"),
        ]))
        .unwrap();

        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(config.network, Network::Private);
        assert_eq!(config.private_endpoints.len(), 2);
        assert_eq!(config.policy.positive_ttl, Duration::from_secs(120));
        assert_eq!(config.policy.negative_ttl, Duration::from_secs(5));
        assert_eq!(config.sweep.grace, Duration::from_secs(30));
        assert_eq!(config.sweep.interval, Duration::from_secs(60));
        assert!(config.debug);
    }

    #[test]
    fn test_bad_values() {
        assert!(ApiConfig::from_lookup(lookup(&[("TRICORDER_NETWORK", "testnet")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("TRICORDER_TX_TTL_SECS", "1m")])).is_err());
    }

    #[test]
    fn test_private_network_needs_endpoints() {
        let config = ApiConfig {
            network: Network::Private,
            ..Default::default()
        };
        assert!(AppState::new(config).is_err());
    }
}
