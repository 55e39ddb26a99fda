//! Error types for Tricorder.
//!
//! One error hierarchy, built with `thiserror`, shared by the fetcher, the
//! cache orchestrator and the HTTP layer. The cache core never inspects the
//! variant of a fetch error; classification exists for logging and for the
//! HTTP mapping.

use thiserror::Error;

/// Result type alias using `TricorderError`.
pub type Result<T> = std::result::Result<T, TricorderError>;

/// Main error type for all Tricorder operations.
#[derive(Debug, Error)]
pub enum TricorderError {
    // ═══════════════════════════════════════════════════════════════════════════
    // RPC ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON-RPC call returned an error object or an unusable response.
    #[error("RPC call to {endpoint} failed: {reason}")]
    RpcError { endpoint: String, reason: String },

    /// Endpoint answered with HTTP 429.
    #[error("Rate limited by {0}")]
    RateLimited(String),

    /// The backend has no transaction for this signature.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Every configured endpoint failed; carries the last failure.
    #[error("All {attempts} endpoints failed, last error: {last}")]
    AllEndpointsFailed {
        attempts: usize,
        last: Box<TricorderError>,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Connection timeout.
    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Transaction signature is not base58 of the right length.
    #[error("Invalid transaction signature: {0}")]
    InvalidSignature(String),

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION & STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl TricorderError {
    /// Returns true if this error is transient and a later attempt may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TricorderError::HttpError(_)
            | TricorderError::ConnectionTimeout(_)
            | TricorderError::RateLimited(_)
            | TricorderError::RpcError { .. } => true,
            TricorderError::AllEndpointsFailed { last, .. } => last.is_recoverable(),
            _ => false,
        }
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            TricorderError::ValidationError(_) | TricorderError::InvalidSignature(_)
        )
    }

    /// Returns true if the error (or the last endpoint error) was an HTTP 429.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            TricorderError::RateLimited(_) => true,
            TricorderError::AllEndpointsFailed { last, .. } => last.is_rate_limited(),
            other => other.to_string().contains("429"),
        }
    }
}
