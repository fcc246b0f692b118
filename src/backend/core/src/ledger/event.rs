//! Provenance events and the write-once event store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::asset::StorageModel;
use super::context::TxContext;
use crate::error::{ErrorCode, ProvenanceError, Result};
use crate::store::StateStore;

/// Key prefix for event records.
pub const EVENT_KEY_PREFIX: &str = "EVENT_";

/// Store key for the event written by `tx_id`.
pub fn event_key(tx_id: &str) -> String {
    format!("{}{}", EVENT_KEY_PREFIX, tx_id)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Event Type
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    MaterialCertificationLightweight,
    MaterialCertificationNaive,
    PrintJobStart,
    PrintJobStartNaive,
    PrintJobCompletion,
    PrintJobCompletionNaive,
    QaCertify,
    QaCertifyNaive,
}

impl EventType {
    pub fn material_certification(model: StorageModel) -> Self {
        match model {
            StorageModel::Lightweight => Self::MaterialCertificationLightweight,
            StorageModel::Naive => Self::MaterialCertificationNaive,
        }
    }

    pub fn print_job_start(model: StorageModel) -> Self {
        match model {
            StorageModel::Lightweight => Self::PrintJobStart,
            StorageModel::Naive => Self::PrintJobStartNaive,
        }
    }

    pub fn print_job_completion(model: StorageModel) -> Self {
        match model {
            StorageModel::Lightweight => Self::PrintJobCompletion,
            StorageModel::Naive => Self::PrintJobCompletionNaive,
        }
    }

    pub fn qa_certify(model: StorageModel) -> Self {
        match model {
            StorageModel::Lightweight => Self::QaCertify,
            StorageModel::Naive => Self::QaCertifyNaive,
        }
    }

    pub fn model(&self) -> StorageModel {
        match self {
            Self::MaterialCertificationLightweight
            | Self::PrintJobStart
            | Self::PrintJobCompletion
            | Self::QaCertify => StorageModel::Lightweight,
            _ => StorageModel::Naive,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        f.write_str(&tag)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Evidence
// ═══════════════════════════════════════════════════════════════════════════════

/// What an event carries as proof of the action it records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    /// Content hash of evidence kept off-chain.
    OffChainHash(String),
    /// The evidence itself, inlined.
    InlinePayload(String),
}

impl Evidence {
    pub fn model(&self) -> StorageModel {
        match self {
            Self::OffChainHash(_) => StorageModel::Lightweight,
            Self::InlinePayload(_) => StorageModel::Naive,
        }
    }

    /// Size in bytes of the carried hash or payload.
    pub fn len(&self) -> usize {
        match self {
            Self::OffChainHash(s) | Self::InlinePayload(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Provenance Event
// ═══════════════════════════════════════════════════════════════════════════════

/// One immutable lifecycle record. Which optional fields are present depends
/// on `event_type`; absent fields are omitted from the encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceEvent {
    pub event_type: EventType,

    #[serde(rename = "agentID")]
    pub agent_id: String,

    /// Assigned by the event store at write time.
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_chain_data_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_chain_data_payload: Option<String>,

    // Material certification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_type: Option<String>,
    #[serde(rename = "materialBatchID", default, skip_serializing_if = "Option::is_none")]
    pub material_batch_id: Option<String>,
    #[serde(rename = "supplierID", default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<String>,

    // Print job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_file_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_file_version: Option<String>,
    #[serde(rename = "machineID", default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(rename = "materialBatchUsedID", default, skip_serializing_if = "Option::is_none")]
    pub material_batch_used_id: Option<String>,
    #[serde(rename = "buildJobID", default, skip_serializing_if = "Option::is_none")]
    pub build_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_inspection_result: Option<String>,

    // QA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_standard_applied: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_test_result: Option<String>,
    #[serde(rename = "certificateID", default, skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
}

/// Treat empty input as an absent field.
pub(crate) fn present(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl ProvenanceEvent {
    /// A bare event of the given type. Agent and timestamp are filled in by
    /// [`EventStore::record`].
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            agent_id: String::new(),
            timestamp: DateTime::<Utc>::default(),
            off_chain_data_hash: None,
            on_chain_data_payload: None,
            material_type: None,
            material_batch_id: None,
            supplier_id: None,
            design_file_hash: None,
            design_file_version: None,
            machine_id: None,
            material_batch_used_id: None,
            build_job_id: None,
            primary_inspection_result: None,
            test_standard_applied: None,
            final_test_result: None,
            certificate_id: None,
        }
    }

    /// Attach evidence to the field matching its model.
    pub fn with_evidence(mut self, evidence: &Evidence) -> Self {
        match evidence {
            Evidence::OffChainHash(hash) => self.off_chain_data_hash = present(hash.as_str()),
            Evidence::InlinePayload(payload) => {
                self.on_chain_data_payload = present(payload.as_str())
            }
        }
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            ProvenanceError::with_internal(
                ErrorCode::SerializationFailed,
                "Failed to encode provenance event",
                e.to_string(),
            )
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            ProvenanceError::with_internal(
                ErrorCode::DeserializationFailed,
                "Failed to decode provenance event",
                e.to_string(),
            )
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Event Store
// ═══════════════════════════════════════════════════════════════════════════════

/// Write-once mapping from transaction id to event. There is no update or
/// delete.
#[derive(Clone)]
pub struct EventStore {
    store: Arc<dyn StateStore>,
}

impl EventStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Stamp `event` with the context's identity and timestamp and write it
    /// under the context's transaction id. Returns that id.
    pub async fn record(&self, ctx: &TxContext, mut event: ProvenanceEvent) -> Result<String> {
        event.agent_id = ctx.caller_identity.clone();
        event.timestamp = ctx.timestamp;

        let bytes = event.encode()?;
        let key = event_key(&ctx.tx_id);

        if !self.store.put_if_absent(&key, bytes).await? {
            return Err(ProvenanceError::persistence(format!(
                "event key {} was already written",
                key
            )));
        }

        debug!(tx_id = %ctx.tx_id, event_type = %event.event_type, "Event recorded");
        Ok(ctx.tx_id.clone())
    }

    /// Read the event written by `tx_id`, `None` if there is none.
    pub async fn get(&self, tx_id: &str) -> Result<Option<ProvenanceEvent>> {
        match self.store.get(&event_key(tx_id)).await? {
            Some(bytes) => ProvenanceEvent::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }
}
