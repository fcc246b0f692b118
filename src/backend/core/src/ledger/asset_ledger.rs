//! The asset ledger: creation, lifecycle updates, and history reconstruction.
//!
//! Every write path records its event first and only then writes the asset
//! that references it, so a history entry never points at an event that was
//! not written. Creations use insert-if-absent and updates use
//! compare-and-put against the bytes read, so concurrent writers cannot
//! silently clobber each other.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::asset::{Asset, StorageModel, NAIVE_ASSET_PREFIX};
use super::context::TxContext;
use super::event::{present, EventStore, EventType, Evidence, ProvenanceEvent, EVENT_KEY_PREFIX};
use super::lifecycle::{initial_stage, LifecycleOperation, StagePolicy};
use crate::error::{ErrorCode, ProvenanceError, Result};
use crate::store::StateStore;
use crate::telemetry::{LedgerMetrics, OperationTimer};

// ═══════════════════════════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════════════════════════

/// Certify a raw material batch, creating the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCertification {
    pub asset_id: String,
    #[serde(default)]
    pub material_type: String,
    #[serde(default)]
    pub material_batch_id: String,
    #[serde(default)]
    pub supplier_id: String,
    pub evidence: Evidence,
}

/// Start a print job, creating the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionStart {
    pub asset_id: String,
    #[serde(default)]
    pub machine_id: String,
    #[serde(default)]
    pub material_batch_used_id: String,
    #[serde(default)]
    pub design_file_hash: String,
    #[serde(default)]
    pub design_file_version: String,
    #[serde(default)]
    pub build_job_id: String,
    pub evidence: Evidence,
}

/// Finish a print job on an existing asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionCompletion {
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub build_job_id: String,
    #[serde(default)]
    pub inspection_result: String,
    pub evidence: Evidence,
}

/// Record the QA verdict on an existing asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaCertification {
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub test_standard: String,
    #[serde(default)]
    pub test_result: String,
    #[serde(default)]
    pub certificate_id: String,
    pub evidence: Evidence,
}

// ═══════════════════════════════════════════════════════════════════════════════
// History
// ═══════════════════════════════════════════════════════════════════════════════

/// One resolved history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tx_id: String,
    pub event: ProvenanceEvent,
}

/// A history entry that could not be resolved and was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Index into the asset's `historyTxIDs`.
    pub position: usize,
    pub tx_id: String,
    pub reason: String,
}

/// Reconstructed history of an asset.
///
/// Entries that fail to read or decode are skipped, so `entries` may be
/// shorter than the recorded history. Check [`AssetHistory::is_complete`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHistory {
    pub asset_id: String,
    pub entries: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEntry>,
}

impl AssetHistory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries the asset references, resolved or not.
    pub fn recorded_len(&self) -> usize {
        self.entries.len() + self.skipped.len()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &ProvenanceEvent> {
        self.entries.iter().map(|e| &e.event)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Ledger
// ═══════════════════════════════════════════════════════════════════════════════

/// Asset ledger over a [`StateStore`].
#[derive(Clone)]
pub struct AssetLedger {
    store: Arc<dyn StateStore>,
    events: EventStore,
    policy: StagePolicy,
}

impl std::fmt::Debug for AssetLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLedger")
            .field("store", &self.store.name())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Reject ids that are empty or would land in another namespace.
fn validate_new_asset_id(asset_id: &str) -> Result<()> {
    validate_asset_key(asset_id)?;
    if asset_id.starts_with(NAIVE_ASSET_PREFIX) {
        return Err(ProvenanceError::invalid_input(format!(
            "asset id must not start with the reserved prefix {}",
            NAIVE_ASSET_PREFIX
        )));
    }
    Ok(())
}

fn validate_asset_key(asset_id: &str) -> Result<()> {
    if asset_id.trim().is_empty() {
        return Err(ProvenanceError::invalid_input("asset id must not be empty"));
    }
    if asset_id.starts_with(EVENT_KEY_PREFIX) {
        return Err(ProvenanceError::invalid_input(format!(
            "asset id must not start with the reserved prefix {}",
            EVENT_KEY_PREFIX
        )));
    }
    Ok(())
}

fn encode_asset(asset: &Asset) -> Result<Vec<u8>> {
    serde_json::to_vec(asset).map_err(|e| {
        ProvenanceError::with_internal(
            ErrorCode::SerializationFailed,
            "Failed to encode asset",
            e.to_string(),
        )
    })
}

fn decode_asset(bytes: &[u8]) -> Result<Asset> {
    serde_json::from_slice(bytes).map_err(|e| {
        ProvenanceError::with_internal(
            ErrorCode::DeserializationFailed,
            "Failed to decode asset",
            e.to_string(),
        )
    })
}

impl AssetLedger {
    pub fn new(store: Arc<dyn StateStore>, policy: StagePolicy) -> Self {
        Self {
            events: EventStore::new(store.clone()),
            store,
            policy,
        }
    }

    pub fn policy(&self) -> StagePolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────────

    /// Certify a material batch. The evidence variant picks the storage model;
    /// naive assets are stored under `NAIVE_<asset_id>`. Returns the tx id.
    #[instrument(skip(self, ctx, request), fields(asset_id = %request.asset_id, tx_id = %ctx.tx_id))]
    pub async fn certify_material(
        &self,
        ctx: &TxContext,
        request: MaterialCertification,
    ) -> Result<String> {
        let timer = OperationTimer::start(LifecycleOperation::CertifyMaterial.name());
        let result: Result<String> = async move {
            let model = request.evidence.model();
            let mut event = ProvenanceEvent::new(EventType::material_certification(model))
                .with_evidence(&request.evidence);
            event.material_type = present(request.material_type);
            event.material_batch_id = present(request.material_batch_id);
            event.supplier_id = present(request.supplier_id);

            self.create(ctx, &request.asset_id, model, LifecycleOperation::CertifyMaterial, event)
                .await
        }
        .await;
        timer.finish(result)
    }

    /// Start a print job, creating the asset in `IN_PRODUCTION`.
    #[instrument(skip(self, ctx, request), fields(asset_id = %request.asset_id, tx_id = %ctx.tx_id))]
    pub async fn start_production(&self, ctx: &TxContext, request: ProductionStart) -> Result<String> {
        let timer = OperationTimer::start(LifecycleOperation::StartProduction.name());
        let result: Result<String> = async move {
            let model = request.evidence.model();
            let mut event = ProvenanceEvent::new(EventType::print_job_start(model))
                .with_evidence(&request.evidence);
            event.machine_id = present(request.machine_id);
            event.material_batch_used_id = present(request.material_batch_used_id);
            event.design_file_hash = present(request.design_file_hash);
            event.design_file_version = present(request.design_file_version);
            event.build_job_id = present(request.build_job_id);

            self.create(ctx, &request.asset_id, model, LifecycleOperation::StartProduction, event)
                .await
        }
        .await;
        timer.finish(result)
    }

    async fn create(
        &self,
        ctx: &TxContext,
        asset_id: &str,
        model: StorageModel,
        operation: LifecycleOperation,
        event: ProvenanceEvent,
    ) -> Result<String> {
        validate_new_asset_id(asset_id)?;
        let key = model.asset_key(asset_id);

        if self.asset_exists(&key).await? {
            return Err(ProvenanceError::asset_already_exists(&key));
        }

        let stage = initial_stage(operation, model)
            .ok_or_else(|| ProvenanceError::internal(format!("{} does not create assets", operation)))?;

        let tx_id = self.events.record(ctx, event).await?;
        let asset = Asset::new(key.clone(), ctx.caller_identity.clone(), stage, tx_id.clone());

        // A concurrent creator may have won between the existence check and here.
        // The event recorded above then stays in the store, referenced by no asset.
        if !self.store.put_if_absent(&key, encode_asset(&asset)?).await? {
            return Err(ProvenanceError::asset_already_exists(&key));
        }

        info!(asset_id = %key, stage = %stage, tx_id = %tx_id, "Asset created");
        Ok(tx_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Updates
    // ─────────────────────────────────────────────────────────────────────────

    /// Complete a print job. Legal from `IN_PRODUCTION` under the enforced
    /// policy; moves the asset to `AWAITING_QA`.
    #[instrument(skip(self, ctx, request), fields(asset_id = %request.asset_id, tx_id = %ctx.tx_id))]
    pub async fn complete_production(
        &self,
        ctx: &TxContext,
        request: ProductionCompletion,
    ) -> Result<String> {
        let operation = LifecycleOperation::CompleteProduction;
        let timer = OperationTimer::start(operation.name());
        let result = self
            .update(ctx, &request.asset_id, operation, |model| {
                let mut event = ProvenanceEvent::new(EventType::print_job_completion(model))
                    .with_evidence(&request.evidence);
                event.build_job_id = present(request.build_job_id.as_str());
                event.primary_inspection_result = present(request.inspection_result.as_str());
                event
            })
            .await;
        timer.finish(result)
    }

    /// Record the QA verdict. A test result of `CERTIFIED_FIT_FOR_USE` moves
    /// the asset to `CERTIFIED`, anything else to `REJECTED`.
    #[instrument(skip(self, ctx, request), fields(asset_id = %request.asset_id, tx_id = %ctx.tx_id))]
    pub async fn qa_certify(&self, ctx: &TxContext, request: QaCertification) -> Result<String> {
        let operation = LifecycleOperation::qa(&request.test_result);
        let timer = OperationTimer::start(operation.name());
        let result = self
            .update(ctx, &request.asset_id, operation, |model| {
                let mut event = ProvenanceEvent::new(EventType::qa_certify(model))
                    .with_evidence(&request.evidence);
                event.test_standard_applied = present(request.test_standard.as_str());
                event.final_test_result = present(request.test_result.as_str());
                event.certificate_id = present(request.certificate_id.as_str());
                event
            })
            .await;
        timer.finish(result)
    }

    async fn update<F>(
        &self,
        ctx: &TxContext,
        asset_id: &str,
        operation: LifecycleOperation,
        build_event: F,
    ) -> Result<String>
    where
        F: FnOnce(StorageModel) -> ProvenanceEvent,
    {
        validate_asset_key(asset_id)?;

        let (mut asset, original) = self.load(asset_id).await?;
        let current = asset.current_lifecycle_stage;

        let next = self.policy.transition(current, operation).ok_or_else(|| {
            ProvenanceError::invalid_stage_transition(asset_id, current, operation)
        })?;

        let tx_id = self.events.record(ctx, build_event(asset.model())).await?;
        asset.advance(tx_id.clone(), next);

        // Losing the swap leaves the recorded event unreferenced.
        if !self
            .store
            .compare_and_put(asset_id, &original, encode_asset(&asset)?)
            .await?
        {
            return Err(ProvenanceError::write_conflict(asset_id));
        }

        info!(asset_id = %asset_id, from = %current, to = %next, tx_id = %tx_id, "Asset advanced");
        Ok(tx_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Read an asset and the exact bytes it was decoded from.
    async fn load(&self, asset_id: &str) -> Result<(Asset, Vec<u8>)> {
        let bytes = self
            .store
            .get(asset_id)
            .await?
            .ok_or_else(|| ProvenanceError::asset_not_found(asset_id))?;
        let asset = decode_asset(&bytes)?;
        Ok((asset, bytes))
    }

    /// Existence predicate over the stored asset id (`NAIVE_` ids included).
    pub async fn asset_exists(&self, asset_id: &str) -> Result<bool> {
        validate_asset_key(asset_id)?;
        Ok(self.store.get(asset_id).await?.is_some())
    }

    #[instrument(skip(self))]
    pub async fn read_asset(&self, asset_id: &str) -> Result<Asset> {
        validate_asset_key(asset_id)?;
        let (asset, _) = self.load(asset_id).await?;
        Ok(asset)
    }

    /// Resolve every entry of the asset's history with one point read each,
    /// in recorded order. Entries that fail to read, are missing, or do not
    /// decode are skipped with a warning.
    #[instrument(skip(self))]
    pub async fn get_asset_history(&self, asset_id: &str) -> Result<AssetHistory> {
        let timer = OperationTimer::start("get_asset_history");
        let result: Result<AssetHistory> = async {
            let asset = self.read_asset(asset_id).await?;

            let mut entries = Vec::with_capacity(asset.history_tx_ids.len());
            let mut skipped = Vec::new();

            for (position, tx_id) in asset.history_tx_ids.iter().enumerate() {
                let reason = match self.events.get(tx_id).await {
                    Ok(Some(event)) => {
                        entries.push(HistoryEntry {
                            tx_id: tx_id.clone(),
                            event,
                        });
                        continue;
                    }
                    Ok(None) => "event not found".to_string(),
                    Err(e) => e.to_string(),
                };

                warn!(
                    asset_id = %asset_id,
                    position = position,
                    tx_id = %tx_id,
                    reason = %reason,
                    "Skipping unresolvable history entry"
                );
                skipped.push(SkippedEntry {
                    position,
                    tx_id: tx_id.clone(),
                    reason,
                });
            }

            LedgerMetrics::record_history_skipped(skipped.len());

            Ok(AssetHistory {
                asset_id: asset.asset_id,
                entries,
                skipped,
            })
        }
        .await;
        timer.finish(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::asset::LifecycleStage;
    use crate::ledger::context::{ContextFactory, SequentialTxIds};
    use crate::store::InMemoryStore;

    fn ledger(policy: StagePolicy) -> (AssetLedger, ContextFactory) {
        let ledger = AssetLedger::new(Arc::new(InMemoryStore::new()), policy);
        let factory = ContextFactory::new("Org1MSP").with_tx_ids(SequentialTxIds::default());
        (ledger, factory)
    }

    fn material(id: &str) -> MaterialCertification {
        MaterialCertification {
            asset_id: id.to_string(),
            material_type: "Ti-6Al-4V".into(),
            material_batch_id: "B-1".into(),
            supplier_id: "SUP-1".into(),
            evidence: Evidence::OffChainHash("h0".into()),
        }
    }

    #[tokio::test]
    async fn test_certify_material_creates_asset() {
        let (ledger, ctx) = ledger(StagePolicy::Enforced);
        let tx = ledger.certify_material(&ctx.begin(), material("A1")).await.unwrap();

        let asset = ledger.read_asset("A1").await.unwrap();
        assert_eq!(asset.current_lifecycle_stage, LifecycleStage::MaterialCertified);
        assert_eq!(asset.owner, "Org1MSP");
        assert_eq!(asset.history_tx_ids, vec![tx]);
    }

    #[tokio::test]
    async fn test_reserved_prefixes_rejected() {
        let (ledger, ctx) = ledger(StagePolicy::Enforced);
        for id in ["", "EVENT_x", "NAIVE_x"] {
            let err = ledger.certify_material(&ctx.begin(), material(id)).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidInput, "id {:?}", id);
        }
        assert_eq!(
            ledger.read_asset("EVENT_tx").await.unwrap_err().code(),
            ErrorCode::InvalidInput
        );
    }

    #[tokio::test]
    async fn test_update_missing_asset_is_not_found() {
        let (ledger, ctx) = ledger(StagePolicy::Enforced);
        let err = ledger
            .complete_production(
                &ctx.begin(),
                ProductionCompletion {
                    asset_id: "ghost".into(),
                    build_job_id: String::new(),
                    inspection_result: String::new(),
                    evidence: Evidence::OffChainHash("h".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_naive_certification_uses_prefixed_key() {
        let (ledger, ctx) = ledger(StagePolicy::Enforced);
        let mut request = material("A1");
        request.evidence = Evidence::InlinePayload("cGF5bG9hZA==".into());
        ledger.certify_material(&ctx.begin(), request).await.unwrap();

        assert!(!ledger.asset_exists("A1").await.unwrap());
        let asset = ledger.read_asset("NAIVE_A1").await.unwrap();
        assert_eq!(asset.asset_id, "NAIVE_A1");
        assert_eq!(asset.current_lifecycle_stage, LifecycleStage::MaterialCertifiedNaive);

        let history = ledger.get_asset_history("NAIVE_A1").await.unwrap();
        let event = history.events().next().unwrap();
        assert_eq!(event.event_type, EventType::MaterialCertificationNaive);
        assert_eq!(event.on_chain_data_payload.as_deref(), Some("cGF5bG9hZA=="));
        assert!(event.off_chain_data_hash.is_none());
    }

    #[tokio::test]
    async fn test_illegal_transition_writes_nothing() {
        let (ledger, ctx) = ledger(StagePolicy::Enforced);
        ledger.certify_material(&ctx.begin(), material("A1")).await.unwrap();

        let context = ctx.begin();
        let err = ledger
            .qa_certify(
                &context,
                QaCertification {
                    asset_id: "A1".into(),
                    test_standard: "ASTM".into(),
                    test_result: "CERTIFIED_FIT_FOR_USE".into(),
                    certificate_id: "C1".into(),
                    evidence: Evidence::OffChainHash("h".into()),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidStageTransition);
        assert!(ledger.events().get(&context.tx_id).await.unwrap().is_none());
        assert_eq!(ledger.read_asset("A1").await.unwrap().history_tx_ids.len(), 1);
    }
}
