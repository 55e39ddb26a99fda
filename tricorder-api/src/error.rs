//! API error handling.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tricorder_core::error::TricorderError;

/// `cache-control` value for responses that must never be stored.
pub const NO_CACHE: &str = "private, max-age=0, no-store, no-cache, must-revalidate";

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: String,
    no_cache: bool,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
            no_cache: false,
        }
    }

    /// Marks the response as uncacheable.
    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// Not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }

    /// A recent lookup failed and retries are suppressed for now.
    pub fn suppressed() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "service unavailable",
            "SUPPRESSED",
        )
        .no_cache()
    }

    /// The upstream lookup failed just now.
    pub fn upstream_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "service unavailable",
            "UPSTREAM_UNAVAILABLE",
        )
        .no_cache()
    }

    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
        };

        let mut response = (self.status, Json(body)).into_response();
        if self.no_cache {
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        }
        response
    }
}

impl From<TricorderError> for ApiError {
    fn from(err: TricorderError) -> Self {
        match &err {
            // Signatures are path segments, a bad one is an unknown resource
            TricorderError::InvalidSignature(_) | TricorderError::TransactionNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            TricorderError::ValidationError(_) => ApiError::validation(err.to_string()),
            e if e.is_recoverable() => {
                tracing::warn!(error = %err, "Upstream failure");
                ApiError::upstream_unavailable()
            }
            _ => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_signature_is_not_found() {
        let err = ApiError::from(TricorderError::InvalidSignature("short".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_recoverable_is_unavailable() {
        let err = ApiError::from(TricorderError::HttpError("reset".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "UPSTREAM_UNAVAILABLE");
    }

    #[test]
    fn test_config_error_is_internal() {
        let err = ApiError::from(TricorderError::ConfigError("missing".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_no_cache_header() {
        let response = ApiError::suppressed().into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::CACHE_CONTROL], NO_CACHE);

        let response = ApiError::not_found("nope").into_response();
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }
}
