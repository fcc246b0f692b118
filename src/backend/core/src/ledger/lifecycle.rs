//! The lifecycle state machine.
//!
//! | From            | Operation                 | To                 |
//! |-----------------|---------------------------|--------------------|
//! | (none)          | certify material batch    | MATERIAL_CERTIFIED |
//! | (none)          | start production job      | IN_PRODUCTION      |
//! | IN_PRODUCTION   | complete production job   | AWAITING_QA        |
//! | AWAITING_QA     | QA certify, pass          | CERTIFIED          |
//! | AWAITING_QA     | QA certify, anything else | REJECTED           |
//!
//! Naive-model assets follow the same table over their `*_NAIVE` stages.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::asset::{LifecycleStage, StorageModel};

/// Test result that moves an asset to CERTIFIED. Any other value rejects it.
pub const QA_PASS_RESULT: &str = "CERTIFIED_FIT_FOR_USE";

/// A lifecycle-advancing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOperation {
    CertifyMaterial,
    StartProduction,
    CompleteProduction,
    QaCertify { passed: bool },
}

impl LifecycleOperation {
    /// The QA operation for a reported test result.
    pub fn qa(test_result: &str) -> Self {
        Self::QaCertify {
            passed: test_result == QA_PASS_RESULT,
        }
    }

    /// Stage this operation moves to, regardless of the current stage.
    pub const fn target(&self) -> LifecycleStage {
        match self {
            Self::CertifyMaterial => LifecycleStage::MaterialCertified,
            Self::StartProduction => LifecycleStage::InProduction,
            Self::CompleteProduction => LifecycleStage::AwaitingQa,
            Self::QaCertify { passed: true } => LifecycleStage::Certified,
            Self::QaCertify { passed: false } => LifecycleStage::Rejected,
        }
    }

    /// Whether this operation creates a new asset.
    pub const fn creates(&self) -> bool {
        matches!(self, Self::CertifyMaterial | Self::StartProduction)
    }

    /// The only stage this operation may be applied from, `None` for creations.
    pub const fn required_stage(&self) -> Option<LifecycleStage> {
        match self {
            Self::CertifyMaterial | Self::StartProduction => None,
            Self::CompleteProduction => Some(LifecycleStage::InProduction),
            Self::QaCertify { .. } => Some(LifecycleStage::AwaitingQa),
        }
    }

    /// Metric and span label.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CertifyMaterial => "certify_material",
            Self::StartProduction => "start_production",
            Self::CompleteProduction => "complete_production",
            Self::QaCertify { .. } => "qa_certify",
        }
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CertifyMaterial => write!(f, "certify material"),
            Self::StartProduction => write!(f, "start production"),
            Self::CompleteProduction => write!(f, "complete production"),
            Self::QaCertify { passed: true } => write!(f, "QA certify (pass)"),
            Self::QaCertify { passed: false } => write!(f, "QA certify (fail)"),
        }
    }
}

/// Stage of a freshly created asset.
pub fn initial_stage(operation: LifecycleOperation, model: StorageModel) -> Option<LifecycleStage> {
    if operation.creates() {
        Some(operation.target().with_model(model))
    } else {
        None
    }
}

/// Whether update operations check the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagePolicy {
    /// Reject operations that are illegal from the current stage.
    #[default]
    Enforced,
    /// Overwrite the stage unconditionally.
    Legacy,
}

impl StagePolicy {
    /// Next stage for an existing asset, or `None` if the operation is not
    /// allowed. The asset's storage model is preserved.
    pub fn transition(
        &self,
        current: LifecycleStage,
        operation: LifecycleOperation,
    ) -> Option<LifecycleStage> {
        let model = current.model();
        match self {
            Self::Legacy if !operation.creates() => Some(operation.target().with_model(model)),
            Self::Legacy => None,
            Self::Enforced => match operation.required_stage() {
                Some(required) if current.base() == required => {
                    Some(operation.target().with_model(model))
                }
                _ => None,
            },
        }
    }
}
