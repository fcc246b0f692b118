//! HTTP API for the provenance ledger.
//!
//! - `POST /api/v1/assets/material-certifications`
//! - `POST /api/v1/assets/production-starts`
//! - `POST /api/v1/assets/:id/production-completion`
//! - `POST /api/v1/assets/:id/qa-certification`
//! - `GET  /api/v1/assets/:id`
//! - `GET  /api/v1/assets/:id/history`
//! - `GET  /api/v1/assets/:id/exists`
//! - `GET  /health`, `GET /metrics`

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::gateway::ProvenanceGateway;
use crate::telemetry::MetricsRegistry;

pub use handlers::{ExistsResponse, TxReceipt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ProvenanceGateway>,
    pub metrics: MetricsRegistry,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ProvenanceGateway>, metrics: MetricsRegistry) -> Self {
        Self { gateway, metrics }
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest("/api/v1", v1_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` resolves.
///
/// The gateway is closed exactly once afterwards, including when binding or
/// serving fails; that failure is returned after the close.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let gateway = state.gateway.clone();
    let served = run_server(addr, build_router(state), shutdown).await;

    if let Err(e) = gateway.close().await {
        tracing::error!(error = %e, "Failed to close gateway");
    }
    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server failed");
    }

    served
}

async fn run_server<F>(addr: SocketAddr, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn v1_router() -> Router<AppState> {
    Router::new()
        .route(
            "/assets/material-certifications",
            post(handlers::certify_material),
        )
        .route("/assets/production-starts", post(handlers::start_production))
        .route("/assets/:id", get(handlers::get_asset))
        .route("/assets/:id/history", get(handlers::get_asset_history))
        .route("/assets/:id/exists", get(handlers::asset_exists))
        .route(
            "/assets/:id/production-completion",
            post(handlers::complete_production),
        )
        .route("/assets/:id/qa-certification", post(handlers::qa_certify))
}

/// Standard API response envelope for successful calls.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}
