//! API request handlers.
//!
//! All handlers return `Result<impl IntoResponse, ProvenanceError>` so that
//! failures reach the client as an `ErrorResponse` carrying the typed error
//! code.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, AppState};
use crate::error::ProvenanceError;
use crate::ledger::{MaterialCertification, ProductionCompletion, ProductionStart, QaCertification};

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "gateway": state.gateway.name(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════════════════════════

/// Returned by every write: which asset was touched and under which tx.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub asset_id: String,
    pub tx_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub asset_id: String,
    pub exists: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Asset Creation
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn certify_material(
    State(state): State<AppState>,
    Json(req): Json<MaterialCertification>,
) -> Result<impl IntoResponse, ProvenanceError> {
    let asset_id = req.evidence.model().asset_key(&req.asset_id);
    let tx_id = state.gateway.certify_material(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(TxReceipt { asset_id, tx_id })),
    ))
}

pub async fn start_production(
    State(state): State<AppState>,
    Json(req): Json<ProductionStart>,
) -> Result<impl IntoResponse, ProvenanceError> {
    let asset_id = req.evidence.model().asset_key(&req.asset_id);
    let tx_id = state.gateway.start_production(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(TxReceipt { asset_id, tx_id })),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Lifecycle Updates
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn complete_production(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Json(mut req): Json<ProductionCompletion>,
) -> Result<impl IntoResponse, ProvenanceError> {
    req.asset_id = asset_id.clone();
    let tx_id = state.gateway.complete_production(req).await?;

    Ok(Json(ApiResponse::success(TxReceipt { asset_id, tx_id })))
}

pub async fn qa_certify(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Json(mut req): Json<QaCertification>,
) -> Result<impl IntoResponse, ProvenanceError> {
    req.asset_id = asset_id.clone();
    let tx_id = state.gateway.qa_certify(req).await?;

    Ok(Json(ApiResponse::success(TxReceipt { asset_id, tx_id })))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Reads
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn get_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Result<impl IntoResponse, ProvenanceError> {
    let asset = state.gateway.read_asset(&asset_id).await?;
    Ok(Json(ApiResponse::success(asset)))
}

pub async fn get_asset_history(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Result<impl IntoResponse, ProvenanceError> {
    let history = state.gateway.get_asset_history(&asset_id).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn asset_exists(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Result<impl IntoResponse, ProvenanceError> {
    let exists = state.gateway.asset_exists(&asset_id).await?;
    Ok(Json(ApiResponse::success(ExistsResponse { asset_id, exists })))
}
