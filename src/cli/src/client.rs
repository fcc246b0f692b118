//! HTTP client for the amprov API server, and a [`ProvenanceGateway`] over it
//! so the benchmark harness can drive a remote ledger.

use amprov_core::api::{ExistsResponse, TxReceipt};
use amprov_core::error::{ErrorCode, ErrorResponse, ProvenanceError, Result};
use amprov_core::gateway::ProvenanceGateway;
use amprov_core::ledger::{
    Asset, AssetHistory, MaterialCertification, ProductionCompletion, ProductionStart,
    QaCertification,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Success envelope written by the server.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
}

fn transport(context: String, error: impl std::error::Error + Send + Sync + 'static) -> ProvenanceError {
    ProvenanceError::with_internal(ErrorCode::TransportFailed, "Request to the API server failed", context)
        .with_source(error)
}

/// HTTP client for the amprov API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a URL under the base from path segments. Each segment is
    /// percent-encoded, so asset ids may contain `/`, `?`, `#` or spaces.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ProvenanceError::configuration(format!("invalid API URL {}", self.base_url)).with_source(e)
        })?;
        url.path_segments_mut()
            .map_err(|_| ProvenanceError::configuration(format!("API URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Perform a GET request and unwrap the response data.
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        self.send(self.client.get(url.clone()), url.as_str()).await
    }

    /// Perform a POST request with a JSON body and unwrap the response data.
    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, segments: &[&str], body: &B) -> Result<T> {
        let url = self.endpoint(segments)?;
        self.send(self.client.post(url.clone()).json(body), url.as_str()).await
    }

    /// Perform a raw GET request and return the full JSON value (for health endpoint).
    pub async fn get_raw(&self, segments: &[&str]) -> Result<serde_json::Value> {
        let url = self.endpoint(segments)?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport(format!("GET {}", url), e))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp, url.as_str()).await);
        }

        resp.json()
            .await
            .map_err(|e| transport(format!("invalid JSON from {}", url), e))
    }

    /// Perform a GET request and return the body as text (for `/metrics`).
    pub async fn get_text(&self, segments: &[&str]) -> Result<String> {
        let url = self.endpoint(segments)?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport(format!("GET {}", url), e))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp, url.as_str()).await);
        }

        resp.text()
            .await
            .map_err(|e| transport(format!("unreadable body from {}", url), e))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, url: &str) -> Result<T> {
        debug!(url = %url, "Sending API request");
        let resp = request
            .send()
            .await
            .map_err(|e| transport(format!("request to {}", url), e))?;

        if !resp.status().is_success() {
            return Err(Self::error_from(resp, url).await);
        }

        let api_resp: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| transport(format!("invalid response from {}", url), e))?;

        match (api_resp.success, api_resp.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(ProvenanceError::with_internal(
                ErrorCode::TransportFailed,
                "API returned success without data",
                url.to_string(),
            )),
        }
    }

    /// Rebuild the server's typed error from an error response. Bodies that
    /// are not an `ErrorResponse` become a transport failure.
    async fn error_from(resp: reqwest::Response, url: &str) -> ProvenanceError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(error) => ProvenanceError::from(error),
            Err(_) => ProvenanceError::with_internal(
                ErrorCode::TransportFailed,
                format!("API error ({})", status),
                format!("{}: {}", url, body),
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Remote Gateway
// ═══════════════════════════════════════════════════════════════════════════════

/// Drives a ledger served by `amprov-server`.
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    client: ApiClient,
}

impl RemoteGateway {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

/// `/api/v1/assets/{asset_id}[/{action}]`, with the id as a single segment.
fn asset_route<'a>(asset_id: &'a str, action: Option<&'a str>) -> Vec<&'a str> {
    let mut segments = vec!["api", "v1", "assets", asset_id];
    segments.extend(action);
    segments
}

#[async_trait]
impl ProvenanceGateway for RemoteGateway {
    async fn certify_material(&self, request: MaterialCertification) -> Result<String> {
        let receipt: TxReceipt = self
            .client
            .post(&["api", "v1", "assets", "material-certifications"], &request)
            .await?;
        Ok(receipt.tx_id)
    }

    async fn start_production(&self, request: ProductionStart) -> Result<String> {
        let receipt: TxReceipt = self
            .client
            .post(&["api", "v1", "assets", "production-starts"], &request)
            .await?;
        Ok(receipt.tx_id)
    }

    async fn complete_production(&self, request: ProductionCompletion) -> Result<String> {
        let route = asset_route(&request.asset_id, Some("production-completion"));
        let receipt: TxReceipt = self.client.post(&route, &request).await?;
        Ok(receipt.tx_id)
    }

    async fn qa_certify(&self, request: QaCertification) -> Result<String> {
        let route = asset_route(&request.asset_id, Some("qa-certification"));
        let receipt: TxReceipt = self.client.post(&route, &request).await?;
        Ok(receipt.tx_id)
    }

    async fn read_asset(&self, asset_id: &str) -> Result<Asset> {
        self.client.get(&asset_route(asset_id, None)).await
    }

    async fn get_asset_history(&self, asset_id: &str) -> Result<AssetHistory> {
        self.client.get(&asset_route(asset_id, Some("history"))).await
    }

    async fn asset_exists(&self, asset_id: &str) -> Result<bool> {
        let response: ExistsResponse = self.client.get(&asset_route(asset_id, Some("exists"))).await?;
        Ok(response.exists)
    }

    /// The HTTP client holds no session; nothing to release.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amprov_core::ledger::Evidence;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> RemoteGateway {
        RemoteGateway::new(ApiClient::new(&server.uri()).unwrap())
    }

    #[tokio::test]
    async fn test_certify_material_returns_tx_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/assets/material-certifications"))
            .and(body_partial_json(json!({ "asset_id": "A1" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "data": { "asset_id": "A1", "tx_id": "tx-00000001" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tx = gateway(&server)
            .certify_material(MaterialCertification {
                asset_id: "A1".into(),
                material_type: "316L".into(),
                material_batch_id: "B1".into(),
                supplier_id: "S1".into(),
                evidence: Evidence::OffChainHash("h".into()),
            })
            .await
            .unwrap();
        assert_eq!(tx, "tx-00000001");
    }

    #[tokio::test]
    async fn test_error_response_keeps_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/assets/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "success": false,
                "error": {
                    "code": "ASSET_NOT_FOUND",
                    "numeric_code": 1001,
                    "message": "Asset ghost not found",
                    "timestamp": "2024-05-01T08:30:00Z"
                }
            })))
            .mount(&server)
            .await;

        let err = gateway(&server).read_asset("ghost").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.user_message(), "Asset ghost not found");
    }

    #[tokio::test]
    async fn test_unstructured_error_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/assets/A1/exists"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = gateway(&server).asset_exists("A1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TransportFailed);
    }

    #[tokio::test]
    async fn test_exists_and_history_unwrap_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/assets/A1/exists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "asset_id": "A1", "exists": true }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/assets/A1/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "asset_id": "A1",
                    "entries": [{
                        "tx_id": "t1",
                        "event": {
                            "eventType": "PRINT_JOB_START",
                            "agentID": "Org1MSP",
                            "timestamp": "2024-05-01T08:30:00Z"
                        }
                    }]
                }
            })))
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        assert!(gateway.asset_exists("A1").await.unwrap());
        let history = gateway.get_asset_history("A1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.is_complete());
    }

    #[tokio::test]
    async fn test_asset_id_is_one_encoded_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/assets/lot%2F7%23a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "assetID": "lot/7#a",
                    "owner": "Org1MSP",
                    "currentLifecycleStage": "IN_PRODUCTION",
                    "historyTxIDs": ["t1"]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/assets/lot%2F7%23a/production-completion"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "data": { "asset_id": "lot/7#a", "tx_id": "t2" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        let asset = gateway.read_asset("lot/7#a").await.unwrap();
        assert_eq!(asset.asset_id, "lot/7#a");

        let tx = gateway
            .complete_production(ProductionCompletion {
                asset_id: "lot/7#a".into(),
                build_job_id: "J1".into(),
                inspection_result: "PASS".into(),
                evidence: Evidence::OffChainHash("h".into()),
            })
            .await
            .unwrap();
        assert_eq!(tx, "t2");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = ApiClient::new("http://ledger:8080/prefix/").unwrap();
        let url = client.endpoint(&["api", "v1", "assets", "a b?"]).unwrap();
        assert_eq!(url.as_str(), "http://ledger:8080/prefix/api/v1/assets/a%20b%3F");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_failure() {
        let client = ApiClient::with_timeout("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = RemoteGateway::new(client).asset_exists("A1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TransportFailed);
    }
}
