//! # Tricorder RPC
//!
//! Fetches Solana transactions over JSON-RPC.
//!
//! [`SolanaRpcClient`] implements [`Fetcher`](tricorder_core::Fetcher), so it
//! plugs straight into `tricorder_cache::ReadThrough`. Requests share one
//! rate limiter and fail over across the configured [`EndpointSet`].
//!
//! ```rust,ignore
//! use tricorder_rpc::{Network, RpcConfig, SolanaRpcClient};
//!
//! let client = SolanaRpcClient::with_config(RpcConfig::new(Network::Devnet))?;
//! let tx = client.get_transaction(&signature).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod endpoints;

pub use client::{RpcConfig, SolanaRpcClient};
pub use endpoints::{parse_endpoint_list, EndpointSet, Network};
