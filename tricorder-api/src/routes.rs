//! API route configuration.

use std::sync::Arc;

use axum::{routing::get, Router};
use serde_json::Value;
use tricorder_core::traits::Fetcher;

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router<F>(state: Arc<AppState<F>>) -> Router
where
    F: Fetcher<Value = Value> + 'static,
{
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats::<F>))

        // Versioned objects: /:version/tx/:signature
        .route("/:version/:object/:id", get(handlers::get_object::<F>))

        .fallback(handlers::fallback::<F>)
        .with_state(state)
}
