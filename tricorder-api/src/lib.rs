//! # Tricorder API Server
//!
//! HTTP front end for the deduplicated transaction cache.
//!
//! ## Endpoints
//!
//! - `GET /` - Service name
//! - `GET /health` - Liveness check
//! - `GET /stats` - Cache and in-flight lookup counts
//! - `GET /:version/tx/:signature` - Transaction by signature (`0` or `latest`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use tricorder_api::{ApiConfig, ApiServer};
//!
//! let config = ApiConfig::from_env()?;
//! let server = ApiServer::new(config)?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use dto::{FailDetail, FailResponse, HealthResponse, StatsResponse, TxResponse};
pub use error::{ApiError, NO_CACHE};
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderName, HeaderValue, Request},
    Router,
};
use serde_json::Value;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use tricorder_cache::spawn_sweeper;
use tricorder_core::constants::SERVICE_NAME;
use tricorder_core::traits::Fetcher;
use tricorder_rpc::SolanaRpcClient;

const X_MOON_ART: HeaderName = HeaderName::from_static("x-moon-art");
const HSTS: &str = "max-age=31536000; preload";

/// API server for Tricorder.
pub struct ApiServer<F: Fetcher = SolanaRpcClient> {
    state: Arc<AppState<F>>,
}

impl ApiServer<SolanaRpcClient> {
    /// Creates a server backed by the Solana RPC client.
    pub fn new(config: ApiConfig) -> tricorder_core::Result<Self> {
        Ok(Self {
            state: Arc::new(AppState::new(config)?),
        })
    }
}

impl<F> ApiServer<F>
where
    F: Fetcher<Value = Value> + 'static,
{
    /// Creates a server around prepared state.
    pub fn with_state(state: Arc<AppState<F>>) -> Self {
        Self { state }
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<AppState<F>> {
        &self.state
    }

    /// Creates the router with all routes and global layers configured.
    pub fn router(&self) -> Router {
        let router = create_router(self.state.clone())
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                X_MOON_ART,
                HeaderValue::from_static(SERVICE_NAME),
            ));

        let router = if self.state.config.debug {
            router
        } else {
            router.layer(SetResponseHeaderLayer::overriding(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS),
            ))
        };

        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(access_span)
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
    }

    /// Runs the server on the configured address, with the cache sweeper
    /// alongside it.
    pub async fn run(self) -> std::io::Result<()> {
        let addr = self.state.config.addr.clone();
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        let sweeper = spawn_sweeper(self.state.reader.cache().clone(), self.state.config.sweep);

        info!(
            addr = %listener.local_addr()?,
            network = %self.state.config.network,
            "Tricorder API server listening"
        );

        let app = self.router();
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;

        sweeper.abort();
        result
    }
}

/// Access log span, keyed on the Cloudflare headers when present.
fn access_span(request: &Request<Body>) -> tracing::Span {
    let headers = request.headers();
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };

    let mut client_ip = header_str("cf-connecting-ip");
    if client_ip.is_empty() {
        if let Some(ConnectInfo(remote)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
            client_ip = remote.to_string();
        }
    }

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        client_ip = %client_ip,
        user_agent = %header_str("user-agent"),
        referer = %header_str("referer"),
        cf_ray = %header_str("cf-ray"),
    )
}
