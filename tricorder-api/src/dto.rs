//! DTOs for API responses.

use serde::{Deserialize, Serialize};
use tricorder_cache::ReadThroughStats;

/// Body of a successful transaction lookup.
#[derive(Debug, Serialize, Deserialize)]
pub struct TxResponse<T> {
    /// Always `"ok"`
    pub status: String,
    /// Transaction as returned by the RPC backend
    pub result: T,
}

impl<T> TxResponse<T> {
    /// Wraps a transaction.
    pub fn ok(result: T) -> Self {
        Self {
            status: "ok".into(),
            result,
        }
    }
}

/// Error detail of a `"fail"` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct FailDetail {
    /// Stable error identifier
    pub error_id: String,
    /// Human-readable message
    pub error_message: String,
}

/// Body returned for an unsupported API version.
#[derive(Debug, Serialize, Deserialize)]
pub struct FailResponse {
    /// Always `"fail"`
    pub status: String,
    /// What went wrong
    pub error: FailDetail,
}

impl FailResponse {
    /// Builds the `invalid_version` response.
    pub fn invalid_version(message: impl Into<String>) -> Self {
        Self {
            status: "fail".into(),
            error: FailDetail {
                error_id: "invalid_version".into(),
                error_message: message.into(),
            },
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests
    pub status: String,
}

/// Cache statistics response.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Network the RPC client talks to
    pub network: String,
    /// Cache and interlock occupancy
    #[serde(flatten)]
    pub stats: ReadThroughStats,
}
