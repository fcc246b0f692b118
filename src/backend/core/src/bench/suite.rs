//! The full benchmark sweep.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::latency::{build_history, measure_history_latency};
use super::payload::PayloadGenerator;
use super::report::{BenchmarkRecord, BenchmarkReport, MeasurementKind};
use super::runner::{run_throughput, FailurePolicy, ThroughputPlan};
use crate::config::BenchConfig;
use crate::error::{ProvenanceError, Result};
use crate::gateway::ProvenanceGateway;
use crate::ledger::{MaterialCertification, StorageModel};
use crate::telemetry::HarnessMetrics;

/// Which measurements a suite run takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchPlan {
    pub operations: usize,
    /// Lightweight throughput is measured at each level.
    pub concurrency_levels: Vec<usize>,
    /// Naive throughput is measured at each size, at the first concurrency level.
    pub payload_sizes: Vec<usize>,
    /// History-read latency is measured at each length.
    pub history_lengths: Vec<usize>,
    pub call_deadline: Duration,
    pub inter_call_delay: Duration,
    pub failure_policy: FailurePolicy,
}

impl From<&BenchConfig> for BenchPlan {
    fn from(config: &BenchConfig) -> Self {
        Self {
            operations: config.operations,
            concurrency_levels: config.concurrency_levels.clone(),
            payload_sizes: config.payload_sizes.clone(),
            history_lengths: config.history_lengths.clone(),
            call_deadline: config.call_deadline,
            inter_call_delay: config.inter_call_delay,
            failure_policy: config.failure_policy,
        }
    }
}

impl BenchPlan {
    fn validate(&self) -> Result<()> {
        if self.concurrency_levels.iter().any(|&c| c == 0) {
            return Err(ProvenanceError::invalid_input("concurrency levels must be positive"));
        }
        if !self.payload_sizes.is_empty() && self.concurrency_levels.is_empty() {
            return Err(ProvenanceError::invalid_input(
                "payload sweeps need at least one concurrency level",
            ));
        }
        if self.history_lengths.iter().any(|&l| l == 0) {
            return Err(ProvenanceError::invalid_input("history lengths must be positive"));
        }
        Ok(())
    }
}

/// Drives a gateway through a [`BenchPlan`] and owns the gateway's lifetime:
/// [`BenchmarkSuite::run`] closes it exactly once however the run ends.
pub struct BenchmarkSuite {
    gateway: Arc<dyn ProvenanceGateway>,
    plan: BenchPlan,
    payloads: PayloadGenerator,
    run_id: String,
}

impl BenchmarkSuite {
    pub fn new(gateway: Arc<dyn ProvenanceGateway>, plan: BenchPlan, seed: Option<u64>) -> Self {
        let run_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            gateway,
            plan,
            payloads: PayloadGenerator::new(seed),
            run_id,
        }
    }

    pub fn from_config(gateway: Arc<dyn ProvenanceGateway>, config: &BenchConfig) -> Self {
        Self::new(gateway, BenchPlan::from(config), config.seed)
    }

    /// Prefix shared by every asset id this run creates.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run every measurement in the plan, then close the gateway.
    pub async fn run(self) -> Result<BenchmarkReport> {
        let result = self.run_measurements().await;

        let closed = self.gateway.close().await;
        if let Err(ref e) = closed {
            error!(error = %e, gateway = self.gateway.name(), "Failed to close gateway");
        }

        let report = result?;
        closed?;
        Ok(report)
    }

    async fn run_measurements(&self) -> Result<BenchmarkReport> {
        self.plan.validate()?;

        info!(
            run_id = %self.run_id,
            gateway = self.gateway.name(),
            operations = self.plan.operations,
            concurrency_levels = ?self.plan.concurrency_levels,
            payload_sizes = ?self.plan.payload_sizes,
            history_lengths = ?self.plan.history_lengths,
            "Benchmark suite starting"
        );

        let mut report = BenchmarkReport::new();

        for &concurrency in &self.plan.concurrency_levels {
            let name = format!("lightweight-c{}", concurrency);
            let record = self
                .measure_creation(&name, StorageModel::Lightweight, 0, concurrency)
                .await;
            report.push(record);
        }

        if let Some(&concurrency) = self.plan.concurrency_levels.first() {
            for &size in &self.plan.payload_sizes {
                let name = format!("naive-{}B", size);
                let record = self
                    .measure_creation(&name, StorageModel::Naive, size, concurrency)
                    .await;
                report.push(record);
            }
        }

        for &length in &self.plan.history_lengths {
            let name = format!("history-{}", length);
            report.push(self.measure_latency(&name, length).await);
        }

        info!(run_id = %self.run_id, records = report.len(), "Benchmark suite finished");
        Ok(report)
    }

    /// Creation throughput via material certification. Inline payloads are
    /// generated once per configuration and cloned per call.
    async fn measure_creation(
        &self,
        name: &str,
        model: StorageModel,
        payload_size: usize,
        concurrency: usize,
    ) -> BenchmarkRecord {
        let shared_payload = match model {
            StorageModel::Naive => Some(self.payloads.evidence(model, payload_size)),
            StorageModel::Lightweight => None,
        };

        let plan = ThroughputPlan {
            operations: self.plan.operations,
            concurrency,
            call_deadline: self.plan.call_deadline,
            policy: self.plan.failure_policy,
        };

        let gateway = &self.gateway;
        let outcome = run_throughput(plan, |index| {
            let evidence = match &shared_payload {
                Some(payload) => payload.clone(),
                None => self.payloads.evidence(model, payload_size),
            };
            let request = MaterialCertification {
                asset_id: format!("{}-{}-{}", self.run_id, name, index),
                material_type: "Ti-6Al-4V".to_string(),
                material_batch_id: format!("BATCH-{}", index),
                supplier_id: "SUPPLIER-1".to_string(),
                evidence,
            };
            async move { gateway.certify_material(request).await }
        })
        .await;

        match outcome {
            Ok(outcome) => {
                HarnessMetrics::set_throughput(name, outcome.throughput);
                BenchmarkRecord::from_throughput(name, model, payload_size, &outcome)
            }
            Err(e) => {
                warn!(benchmark = %name, error = %e, "Throughput measurement failed");
                BenchmarkRecord::failed(name, MeasurementKind::Throughput, model, e.to_string())
                    .with_payload_bytes(payload_size)
            }
        }
    }

    async fn measure_latency(&self, name: &str, length: usize) -> BenchmarkRecord {
        let asset_id = format!("{}-{}", self.run_id, name);

        let result = async {
            build_history(
                self.gateway.as_ref(),
                &self.payloads,
                &asset_id,
                length,
                self.plan.inter_call_delay,
                self.plan.call_deadline,
            )
            .await?;
            measure_history_latency(self.gateway.as_ref(), &asset_id, self.plan.call_deadline).await
        }
        .await;

        match result {
            Ok(sample) => {
                HarnessMetrics::set_latency(length, sample.latency);
                BenchmarkRecord::from_latency(name, &sample)
            }
            Err(e) => {
                warn!(benchmark = %name, error = %e, "Latency measurement failed");
                BenchmarkRecord::failed(
                    name,
                    MeasurementKind::Latency,
                    StorageModel::Lightweight,
                    e.to_string(),
                )
                .with_history_length(length)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::report::RecordStatus;
    use crate::gateway::LocalGateway;
    use crate::ledger::StagePolicy;

    fn small_plan() -> BenchPlan {
        BenchPlan {
            operations: 20,
            concurrency_levels: vec![5],
            payload_sizes: vec![0, 512],
            history_lengths: vec![4],
            call_deadline: Duration::from_secs(5),
            inter_call_delay: Duration::ZERO,
            failure_policy: FailurePolicy::FailFast,
        }
    }

    #[tokio::test]
    async fn test_suite_records_in_order() {
        let gateway = Arc::new(LocalGateway::in_memory("Org1MSP", StagePolicy::Legacy));
        let report = BenchmarkSuite::new(gateway, small_plan(), Some(3)).run().await.unwrap();

        let names: Vec<_> = report.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["lightweight-c5", "naive-0B", "naive-512B", "history-4"]);
        assert!(report.all_ok());
        assert_eq!(report.records[3].history_length, Some(4));
    }

    #[tokio::test]
    async fn test_invalid_plan_still_closes_gateway() {
        let gateway = Arc::new(LocalGateway::in_memory("Org1MSP", StagePolicy::Legacy));
        let mut plan = small_plan();
        plan.concurrency_levels = vec![0];

        let result = BenchmarkSuite::new(gateway.clone(), plan, None).run().await;
        assert!(result.is_err());
        assert!(gateway.asset_exists("x").await.unwrap_err().is_persistence());
    }

    #[tokio::test]
    async fn test_latency_failure_is_recorded() {
        let gateway = Arc::new(LocalGateway::in_memory("Org1MSP", StagePolicy::Enforced));
        let mut plan = small_plan();
        plan.concurrency_levels = vec![];
        plan.payload_sizes = vec![];

        let report = BenchmarkSuite::new(gateway, plan, None).run().await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.records[0].status, RecordStatus::Failed);
    }
}
