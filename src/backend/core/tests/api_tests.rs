//! Tests for the HTTP API.
//!
//! Tests cover:
//! - Health check and metrics endpoints
//! - Asset creation, lifecycle updates, and reads over HTTP
//! - Error responses and status codes
//! - Request/Response serialization
//! - Server lifecycle: the store is closed on clean shutdown and on bind failure

use amprov_core::api::{self, build_router, ApiResponse, AppState, ExistsResponse, TxReceipt};
use amprov_core::error::{ErrorCode, ErrorResponse};
use amprov_core::gateway::{LocalGateway, ProvenanceGateway};
use amprov_core::ledger::{Asset, AssetHistory, AssetLedger, ContextFactory, LifecycleStage, StagePolicy};
use amprov_core::store::InMemoryStore;
use amprov_core::telemetry::MetricsRegistry;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

fn app(policy: StagePolicy) -> Router {
    let gateway: Arc<dyn ProvenanceGateway> = Arc::new(LocalGateway::in_memory("Org1MSP", policy));
    build_router(AppState::new(gateway, MetricsRegistry::disabled()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn data<T: DeserializeOwned>(bytes: &[u8]) -> T {
    let response: ApiResponse<T> = serde_json::from_slice(bytes).unwrap();
    assert!(response.success);
    response.data.unwrap()
}

fn material_body(asset_id: &str) -> Value {
    json!({
        "asset_id": asset_id,
        "material_type": "Ti-6Al-4V",
        "material_batch_id": "BATCH-1",
        "supplier_id": "SUP-1",
        "evidence": { "off_chain_hash": "3f7a" }
    })
}

fn start_body(asset_id: &str) -> Value {
    json!({
        "asset_id": asset_id,
        "machine_id": "EOS-M290",
        "build_job_id": "JOB-1",
        "evidence": { "off_chain_hash": "d00d" }
    })
}

// ============================================================================
// Health & Metrics
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = app(StagePolicy::Enforced);
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["gateway"], "local");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint_is_plain_text() {
    let app = app(StagePolicy::Enforced);
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

// ============================================================================
// Asset Endpoints
// ============================================================================

#[tokio::test]
async fn test_certify_material_returns_receipt() {
    let app = app(StagePolicy::Enforced);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assets/material-certifications",
        Some(material_body("A1")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let receipt: TxReceipt = data(&body);
    assert_eq!(receipt.asset_id, "A1");
    assert!(!receipt.tx_id.is_empty());

    let (status, body) = send(&app, Method::GET, "/api/v1/assets/A1", None).await;
    assert_eq!(status, StatusCode::OK);
    let asset: Asset = data(&body);
    assert_eq!(asset.current_lifecycle_stage, LifecycleStage::MaterialCertified);
    assert_eq!(asset.history_tx_ids, vec![receipt.tx_id]);
}

#[tokio::test]
async fn test_percent_encoded_id_is_one_path_segment() {
    let app = app(StagePolicy::Enforced);
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/assets/material-certifications",
        Some(material_body("lot/7#a")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, "/api/v1/assets/lot%2F7%23a", None).await;
    assert_eq!(status, StatusCode::OK);
    let asset: Asset = data(&body);
    assert_eq!(asset.asset_id, "lot/7#a");

    let (status, body) = send(&app, Method::GET, "/api/v1/assets/lot%2F7%23a/exists", None).await;
    assert_eq!(status, StatusCode::OK);
    let exists: ExistsResponse = data(&body);
    assert!(exists.exists);
}

#[tokio::test]
async fn test_naive_receipt_reports_prefixed_id() {
    let app = app(StagePolicy::Enforced);
    let mut body = material_body("A1");
    body["evidence"] = json!({ "inline_payload": "cGF5bG9hZA==" });

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/v1/assets/material-certifications",
        Some(body),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let receipt: TxReceipt = data(&bytes);
    assert_eq!(receipt.asset_id, "NAIVE_A1");

    let (_, bytes) = send(&app, Method::GET, "/api/v1/assets/NAIVE_A1/exists", None).await;
    let exists: ExistsResponse = data(&bytes);
    assert!(exists.exists);
}

#[tokio::test]
async fn test_lifecycle_over_http() {
    let app = app(StagePolicy::Enforced);
    send(
        &app,
        Method::POST,
        "/api/v1/assets/production-starts",
        Some(start_body("P1")),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/assets/P1/production-completion",
        Some(json!({
            "build_job_id": "JOB-1",
            "inspection_result": "NO_DEFECTS",
            "evidence": { "off_chain_hash": "beef" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/assets/P1/qa-certification",
        Some(json!({
            "test_standard": "ASTM F3001",
            "test_result": "CERTIFIED_FIT_FOR_USE",
            "certificate_id": "CERT-9",
            "evidence": { "off_chain_hash": "cafe" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/api/v1/assets/P1/history", None).await;
    assert_eq!(status, StatusCode::OK);
    let history: AssetHistory = data(&body);
    assert_eq!(history.len(), 3);
    assert_eq!(
        history.entries[2].event.certificate_id.as_deref(),
        Some("CERT-9")
    );
}

#[tokio::test]
async fn test_exists_for_unknown_asset_is_false() {
    let app = app(StagePolicy::Enforced);
    let (status, body) = send(&app, Method::GET, "/api/v1/assets/ghost/exists", None).await;

    assert_eq!(status, StatusCode::OK);
    let exists: ExistsResponse = data(&body);
    assert_eq!(exists.asset_id, "ghost");
    assert!(!exists.exists);
}

// ============================================================================
// Error Handling
// ============================================================================

#[tokio::test]
async fn test_duplicate_creation_is_conflict() {
    let app = app(StagePolicy::Enforced);
    let uri = "/api/v1/assets/material-certifications";
    send(&app, Method::POST, uri, Some(material_body("A1"))).await;
    let (status, body) = send(&app, Method::POST, uri, Some(material_body("A1"))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert!(!error.success);
    assert_eq!(error.error.code, ErrorCode::AssetAlreadyExists);
    assert_eq!(error.error.numeric_code, 1000);
}

#[tokio::test]
async fn test_missing_asset_is_not_found() {
    let app = app(StagePolicy::Enforced);
    let (status, body) = send(&app, Method::GET, "/api/v1/assets/ghost", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.code, ErrorCode::AssetNotFound);
}

#[tokio::test]
async fn test_illegal_transition_is_conflict() {
    let app = app(StagePolicy::Enforced);
    send(
        &app,
        Method::POST,
        "/api/v1/assets/material-certifications",
        Some(material_body("A1")),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assets/A1/production-completion",
        Some(json!({ "evidence": { "off_chain_hash": "x" } })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.code, ErrorCode::InvalidStageTransition);
}

#[tokio::test]
async fn test_reserved_prefix_is_unprocessable() {
    let app = app(StagePolicy::Enforced);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/assets/material-certifications",
        Some(material_body("EVENT_A1")),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let app = app(StagePolicy::Enforced);
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/assets/material-certifications",
        Some(json!({ "asset_id": "A1" })),
    )
    .await;

    assert!(status.is_client_error());
}

// ============================================================================
// Server Lifecycle Tests
// ============================================================================

fn state_over(store: &Arc<InMemoryStore>) -> AppState {
    let ledger = AssetLedger::new(store.clone(), StagePolicy::Enforced);
    let gateway: Arc<dyn ProvenanceGateway> =
        Arc::new(LocalGateway::new(ledger, ContextFactory::new("Org1MSP")));
    AppState::new(gateway, MetricsRegistry::disabled())
}

#[tokio::test]
async fn test_serve_closes_store_on_shutdown() {
    let store = Arc::new(InMemoryStore::new());
    let addr = "127.0.0.1:0".parse().unwrap();

    api::serve(addr, state_over(&store), async {}).await.unwrap();

    assert!(store.is_closed());
}

#[tokio::test]
async fn test_serve_closes_store_when_bind_fails() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap();
    let store = Arc::new(InMemoryStore::new());

    let result = api::serve(addr, state_over(&store), async {}).await;

    assert!(result.is_err());
    assert!(store.is_closed());
}
