//! History-read latency measurement.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::payload::PayloadGenerator;
use super::runner::call_with_deadline;
use crate::error::{ErrorCode, ProvenanceError, Result};
use crate::gateway::ProvenanceGateway;
use crate::ledger::{Evidence, ProductionCompletion, ProductionStart};

/// One timed `GetAssetHistory` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    pub asset_id: String,
    /// Events returned by the read.
    pub history_length: usize,
    /// Events the asset references, including skipped ones.
    pub recorded_length: usize,
    #[serde(with = "humantime_serde")]
    pub latency: Duration,
}

impl LatencySample {
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

/// Create `asset_id` with a print-job start and extend it with completion
/// events until it has `length` history entries, pausing `delay` between
/// calls.
///
/// Repeated completions are only accepted by a ledger running the legacy
/// stage policy; an enforcing ledger fails the second completion with
/// `InvalidStageTransition`.
pub async fn build_history(
    gateway: &dyn ProvenanceGateway,
    payloads: &PayloadGenerator,
    asset_id: &str,
    length: usize,
    delay: Duration,
    deadline: Duration,
) -> Result<()> {
    if length == 0 {
        return Err(ProvenanceError::invalid_input("history length must be positive"));
    }

    call_with_deadline(
        deadline,
        gateway.start_production(ProductionStart {
            asset_id: asset_id.to_string(),
            machine_id: "BENCH-MACHINE".to_string(),
            material_batch_used_id: "BENCH-BATCH".to_string(),
            design_file_hash: payloads.content_hash(),
            design_file_version: String::new(),
            build_job_id: format!("{}-job", asset_id),
            evidence: Evidence::OffChainHash(payloads.content_hash()),
        }),
    )
    .await?;

    for step in 1..length {
        tokio::time::sleep(delay).await;
        let result = call_with_deadline(
            deadline,
            gateway.complete_production(ProductionCompletion {
                asset_id: asset_id.to_string(),
                build_job_id: format!("{}-job", asset_id),
                inspection_result: format!("PASS_{}", step),
                evidence: Evidence::OffChainHash(payloads.content_hash()),
            }),
        )
        .await;

        if let Err(e) = result {
            if e.code() == ErrorCode::InvalidStageTransition {
                return Err(ProvenanceError::invalid_input(format!(
                    "cannot build a history of {} entries: the ledger enforces stage transitions \
                     (run it with the legacy stage policy)",
                    length
                ))
                .with_source(e));
            }
            return Err(e);
        }
        debug!(asset_id = %asset_id, step = step + 1, of = length, "History entry added");
    }

    Ok(())
}

/// Time one `GetAssetHistory` call end to end.
pub async fn measure_history_latency(
    gateway: &dyn ProvenanceGateway,
    asset_id: &str,
    deadline: Duration,
) -> Result<LatencySample> {
    let start = Instant::now();
    let history = call_with_deadline(deadline, gateway.get_asset_history(asset_id)).await?;
    let latency = start.elapsed();

    info!(
        asset_id = %asset_id,
        history_length = history.len(),
        latency_ms = latency.as_secs_f64() * 1000.0,
        "History read timed"
    );

    Ok(LatencySample {
        asset_id: asset_id.to_string(),
        history_length: history.len(),
        recorded_length: history.recorded_len(),
        latency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::LocalGateway;
    use crate::ledger::StagePolicy;

    #[tokio::test]
    async fn test_build_and_measure() {
        let gateway = LocalGateway::in_memory("Org1MSP", StagePolicy::Legacy);
        let payloads = PayloadGenerator::new(Some(1));

        build_history(&gateway, &payloads, "H1", 12, Duration::ZERO, Duration::from_secs(5))
            .await
            .unwrap();
        let sample = measure_history_latency(&gateway, "H1", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(sample.history_length, 12);
        assert_eq!(sample.recorded_length, 12);
    }

    #[tokio::test]
    async fn test_build_against_enforcing_ledger_explains_itself() {
        let gateway = LocalGateway::in_memory("Org1MSP", StagePolicy::Enforced);
        let payloads = PayloadGenerator::new(Some(1));

        let err = build_history(&gateway, &payloads, "H1", 5, Duration::ZERO, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
        assert!(err.user_message().contains("legacy stage policy"));
    }

    #[tokio::test]
    async fn test_measure_missing_asset() {
        let gateway = LocalGateway::in_memory("Org1MSP", StagePolicy::Legacy);
        let err = measure_history_latency(&gateway, "nope", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
