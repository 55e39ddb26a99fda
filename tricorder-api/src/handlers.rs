//! API route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{debug, error, info};

use tricorder_core::constants::{
    INVALID_VERSION_MAX_AGE_SECS, SERVICE_NAME, TX_CACHE_MAX_AGE_SECS,
};
use tricorder_core::traits::Fetcher;
use tricorder_core::types::{ApiVersion, TxSignature};

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// GET /
pub async fn index() -> &'static str {
    SERVICE_NAME
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

/// GET /stats
pub async fn get_stats<F>(State(state): State<Arc<AppState<F>>>) -> Json<StatsResponse>
where
    F: Fetcher<Value = Value>,
{
    Json(StatsResponse {
        network: state.config.network.to_string(),
        stats: state.reader.stats(),
    })
}

/// GET /:version/:object/:id
///
/// The version is checked before the object, so `/v9/anything/x` answers with
/// `invalid_version`. Only `tx` objects exist today.
pub async fn get_object<F>(
    State(state): State<Arc<AppState<F>>>,
    Path((version, object, id)): Path<(String, String, String)>,
) -> Result<Response>
where
    F: Fetcher<Value = Value>,
{
    serve_object(&state, &version, &object, &id).await
}

/// Fallback for paths the route table does not match.
///
/// Empty segments are ignored and anything past the third segment is
/// dropped, so `/0/tx/<sig>/` and `//0/tx/<sig>` resolve like
/// `/0/tx/<sig>`.
pub async fn fallback<F>(State(state): State<Arc<AppState<F>>>, uri: Uri) -> Result<Response>
where
    F: Fetcher<Value = Value>,
{
    let parts: Vec<&str> = uri.path().split('/').filter(|p| !p.is_empty()).collect();

    match parts.as_slice() {
        [version, object, id, ..] => serve_object(&state, version, object, id).await,
        _ => Err(ApiError::not_found("not found")),
    }
}

async fn serve_object<F>(
    state: &AppState<F>,
    version: &str,
    object: &str,
    id: &str,
) -> Result<Response>
where
    F: Fetcher<Value = Value>,
{
    let version = match version.parse::<ApiVersion>() {
        Ok(parsed) => parsed,
        Err(_) => return Ok(invalid_version(version)),
    };

    match object {
        "tx" => get_transaction(state, version, id).await,
        _ => Err(ApiError::not_found(format!("unknown object `{}`", object))),
    }
}

async fn get_transaction<F>(
    state: &AppState<F>,
    version: ApiVersion,
    id: &str,
) -> Result<Response>
where
    F: Fetcher<Value = Value>,
{
    let signature = TxSignature::parse(id)?;
    // Every supported version renders the v0 shape
    debug!(
        requested = version.as_str(),
        format = version.resolve().as_str(),
        signature = %signature,
        "Transaction lookup"
    );

    match state.reader.get_or_fetch(signature.as_str()).await {
        Ok(Some(tx)) => {
            info!(signature = %signature, "Served transaction");
            Ok((
                [
                    (
                        header::CACHE_CONTROL,
                        format!("public, max-age={}", TX_CACHE_MAX_AGE_SECS),
                    ),
                    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
                ],
                Json(TxResponse::ok(tx)),
            )
                .into_response())
        }
        Ok(None) => {
            debug!(signature = %signature, "Lookup suppressed by recent failure");
            Err(ApiError::suppressed())
        }
        Err(err) => {
            error!(signature = %signature, error = %err, "Transaction lookup failed");
            Err(ApiError::upstream_unavailable())
        }
    }
}

fn invalid_version(raw: &str) -> Response {
    (
        StatusCode::OK,
        [
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", INVALID_VERSION_MAX_AGE_SECS),
            ),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        Json(FailResponse::invalid_version(ApiVersion::unsupported_message(raw))),
    )
        .into_response()
}
