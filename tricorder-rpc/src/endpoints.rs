//! RPC endpoint selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tricorder_core::constants::{
    DEVNET_ENDPOINTS, PRIVATE_ENDPOINTS_ENV, PRIVATE_REQUESTS_PER_CPU, PUBLIC_ENDPOINTS,
    PUBLIC_REQUESTS_PER_ENDPOINT,
};
use tricorder_core::error::{Result, TricorderError};

/// Which Solana cluster and endpoint pool to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Devnet public endpoint
    Devnet,
    /// Public mainnet endpoints
    #[default]
    Public,
    /// Operator-supplied endpoints from `TRICORDER_PRIVATE_ENDPOINTS`
    Private,
}

impl FromStr for Network {
    type Err = TricorderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "devnet" => Ok(Network::Devnet),
            "public" | "mainnet" => Ok(Network::Public),
            "private" => Ok(Network::Private),
            other => Err(TricorderError::ConfigError(format!(
                "unknown network `{}`, expected devnet, public or private",
                other
            ))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Devnet => "devnet",
            Network::Public => "public",
            Network::Private => "private",
        })
    }
}

/// Ordered list of endpoints tried for each request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointSet {
    network: Network,
    urls: Vec<String>,
}

impl EndpointSet {
    /// Resolves the endpoints for `network`.
    ///
    /// `private` is only consulted for [`Network::Private`], where an empty
    /// list is a configuration error.
    pub fn resolve(network: Network, private: &[String]) -> Result<Self> {
        let urls: Vec<String> = match network {
            Network::Devnet => DEVNET_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            Network::Public => PUBLIC_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            Network::Private => clean_endpoints(private.iter().map(String::as_str)),
        };

        if urls.is_empty() {
            return Err(TricorderError::ConfigError(format!(
                "{} must be set with a `;` separated list of endpoints",
                PRIVATE_ENDPOINTS_ENV
            )));
        }

        Ok(Self { network, urls })
    }

    /// Builds a private set from explicit URLs.
    pub fn private(urls: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        Self::resolve(Network::Private, &urls)
    }

    /// Network this set was resolved for.
    pub fn network(&self) -> Network {
        self.network
    }

    /// Endpoints in the order they are tried.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Number of endpoints.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Always false for a resolved set.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Requests per second the shared limiter allows for this network.
    ///
    /// Public and devnet endpoints get a conservative fixed budget; private
    /// endpoints scale with the host.
    pub fn requests_per_second(&self) -> u32 {
        match self.network {
            Network::Devnet | Network::Public => {
                PUBLIC_REQUESTS_PER_ENDPOINT * PUBLIC_ENDPOINTS.len() as u32
            }
            Network::Private => {
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get() as u32)
                    .unwrap_or(1);
                PRIVATE_REQUESTS_PER_CPU * cpus
            }
        }
    }
}

/// Splits a `;`-separated endpoint list, dropping blanks.
pub fn parse_endpoint_list(raw: &str) -> Vec<String> {
    clean_endpoints(raw.split(';'))
}

fn clean_endpoints<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
