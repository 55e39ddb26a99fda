//! Solana JSON-RPC client.
//!
//! One request budget is shared by every lookup in the process. Each lookup
//! takes a permit, then walks the endpoint list until one answers.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use tricorder_core::error::{Result, TricorderError};
use tricorder_core::traits::Fetcher;
use tricorder_core::types::TxSignature;

use crate::endpoints::{parse_endpoint_list, EndpointSet, Network};

/// RPC client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Endpoint pool
    pub network: Network,
    /// Endpoints used when `network` is private
    pub private_endpoints: Vec<String>,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Overrides the network's default request budget
    pub requests_per_second: Option<u32>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            network: Network::Public,
            private_endpoints: Vec::new(),
            timeout_seconds: 30,
            requests_per_second: None,
        }
    }
}

impl RpcConfig {
    /// Creates a config for `network`.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ..Default::default()
        }
    }

    /// Uses the given private endpoints.
    pub fn with_private_endpoints(
        mut self,
        endpoints: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.network = Network::Private;
        self.private_endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Reads private endpoints from a `;`-separated list.
    pub fn with_private_endpoint_list(mut self, raw: &str) -> Self {
        self.private_endpoints = parse_endpoint_list(raw);
        self
    }

    /// Overrides the request budget.
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = Some(rps);
        self
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Solana JSON-RPC client with failover across an [`EndpointSet`].
pub struct SolanaRpcClient {
    http_client: reqwest::Client,
    endpoints: EndpointSet,
    limiter: DefaultDirectRateLimiter,
}

impl SolanaRpcClient {
    /// Creates a client from configuration.
    pub fn with_config(config: RpcConfig) -> Result<Self> {
        let endpoints = EndpointSet::resolve(config.network, &config.private_endpoints)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| TricorderError::ConfigError(format!("HTTP client: {}", e)))?;

        let rps = config
            .requests_per_second
            .unwrap_or_else(|| endpoints.requests_per_second());
        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN));

        debug!(
            network = %endpoints.network(),
            endpoints = endpoints.len(),
            rps,
            "Created RPC client"
        );

        Ok(Self {
            http_client,
            endpoints,
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Endpoints this client tries, in order.
    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    /// Fetches a transaction by signature.
    ///
    /// Tries each endpoint in order and returns the first success. A 429
    /// from an endpoint costs an extra permit before the next attempt.
    #[instrument(skip(self), fields(signature = %signature))]
    pub async fn get_transaction(&self, signature: &TxSignature) -> Result<Value> {
        self.limiter.until_ready().await;

        let mut last_error = None;
        for endpoint in self.endpoints.urls() {
            debug!(endpoint, "getTransaction");

            match self.call_get_transaction(endpoint, signature).await {
                Ok(tx) => return Ok(tx),
                Err(err) => {
                    warn!(endpoint, error = %err, "getTransaction failed");
                    if err.is_rate_limited() {
                        self.limiter.until_ready().await;
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(match last_error {
            Some(last) => TricorderError::AllEndpointsFailed {
                attempts: self.endpoints.len(),
                last: Box::new(last),
            },
            None => TricorderError::InternalError("no endpoints configured".into()),
        })
    }

    async fn call_get_transaction(&self, endpoint: &str, signature: &TxSignature) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTransaction",
            "params": [
                signature.as_str(),
                { "encoding": "json", "maxSupportedTransactionVersion": 0 }
            ]
        });

        let response = self
            .http_client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TricorderError::ConnectionTimeout(format!("{}: {}", endpoint, e))
                } else {
                    TricorderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TricorderError::RateLimited(endpoint.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TricorderError::RpcError {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP {}: {}", status, text),
            });
        }

        let body: RpcResponse = response.json().await.map_err(|e| TricorderError::RpcError {
            endpoint: endpoint.to_string(),
            reason: format!("invalid response: {}", e),
        })?;

        if let Some(error) = body.error {
            if error.code == 429 {
                return Err(TricorderError::RateLimited(endpoint.to_string()));
            }
            return Err(TricorderError::RpcError {
                endpoint: endpoint.to_string(),
                reason: format!("{} (code {})", error.message, error.code),
            });
        }

        match body.result {
            Some(Value::Null) | None => Err(TricorderError::TransactionNotFound(
                signature.to_string(),
            )),
            Some(tx) => Ok(tx),
        }
    }
}

#[async_trait]
impl Fetcher for SolanaRpcClient {
    type Value = Value;

    async fn fetch(&self, key: &str) -> Result<Value> {
        let signature = TxSignature::parse(key)?;
        self.get_transaction(&signature).await
    }
}
