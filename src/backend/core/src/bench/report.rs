//! Ordered benchmark results for presentation.

use serde::{Deserialize, Serialize};

use super::latency::LatencySample;
use super::runner::ThroughputOutcome;
use crate::ledger::StorageModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    Throughput,
    Latency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Ok,
    /// Some calls failed but the run continued.
    Partial,
    /// A fail-fast run stopped early.
    Aborted,
    /// The measurement could not be taken.
    Failed,
}

/// One configuration's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub name: String,
    pub kind: MeasurementKind,
    pub model: StorageModel,
    /// Bytes of raw evidence per call (inline payload size, or 0 for hashes).
    pub payload_bytes: usize,
    pub operations: usize,
    pub concurrency: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Transactions per second, throughput records only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_tps: Option<f64>,
    /// Milliseconds, latency records only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchmarkRecord {
    pub fn from_throughput(
        name: impl Into<String>,
        model: StorageModel,
        payload_bytes: usize,
        outcome: &ThroughputOutcome,
    ) -> Self {
        let status = if outcome.aborted {
            RecordStatus::Aborted
        } else if outcome.failed > 0 {
            RecordStatus::Partial
        } else {
            RecordStatus::Ok
        };

        Self {
            name: name.into(),
            kind: MeasurementKind::Throughput,
            model,
            payload_bytes,
            operations: outcome.operations,
            concurrency: outcome.concurrency,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            throughput_tps: Some(outcome.throughput),
            latency_ms: None,
            history_length: None,
            status,
            error: outcome.first_error.clone(),
        }
    }

    pub fn from_latency(name: impl Into<String>, sample: &LatencySample) -> Self {
        Self {
            name: name.into(),
            kind: MeasurementKind::Latency,
            model: StorageModel::Lightweight,
            payload_bytes: 0,
            operations: 1,
            concurrency: 1,
            succeeded: 1,
            failed: 0,
            throughput_tps: None,
            latency_ms: Some(sample.latency_ms()),
            history_length: Some(sample.history_length),
            status: if sample.history_length == sample.recorded_length {
                RecordStatus::Ok
            } else {
                RecordStatus::Partial
            },
            error: None,
        }
    }

    /// A measurement that could not be taken at all.
    pub fn failed(
        name: impl Into<String>,
        kind: MeasurementKind,
        model: StorageModel,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            model,
            payload_bytes: 0,
            operations: 0,
            concurrency: 0,
            succeeded: 0,
            failed: 0,
            throughput_tps: match kind {
                MeasurementKind::Throughput => Some(0.0),
                MeasurementKind::Latency => None,
            },
            latency_ms: None,
            history_length: None,
            status: RecordStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn with_payload_bytes(mut self, payload_bytes: usize) -> Self {
        self.payload_bytes = payload_bytes;
        self
    }

    pub fn with_history_length(mut self, history_length: usize) -> Self {
        self.history_length = Some(history_length);
        self
    }
}

/// Records in the order they were measured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub records: Vec<BenchmarkRecord>,
}

impl BenchmarkReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: BenchmarkRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn throughput(&self) -> impl Iterator<Item = &BenchmarkRecord> {
        self.records
            .iter()
            .filter(|r| r.kind == MeasurementKind::Throughput)
    }

    pub fn latency(&self) -> impl Iterator<Item = &BenchmarkRecord> {
        self.records.iter().filter(|r| r.kind == MeasurementKind::Latency)
    }

    /// Whether every record finished without failures.
    pub fn all_ok(&self) -> bool {
        self.records.iter().all(|r| r.status == RecordStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome(aborted: bool, failed: usize) -> ThroughputOutcome {
        ThroughputOutcome {
            operations: 100,
            concurrency: 10,
            succeeded: 100 - failed,
            failed,
            abandoned: 0,
            elapsed: Duration::from_millis(500),
            throughput: if aborted { 0.0 } else { 200.0 },
            aborted,
            first_error: None,
        }
    }

    #[test]
    fn test_status_from_throughput() {
        let ok = BenchmarkRecord::from_throughput("a", StorageModel::Lightweight, 0, &outcome(false, 0));
        let partial = BenchmarkRecord::from_throughput("b", StorageModel::Lightweight, 0, &outcome(false, 3));
        let aborted = BenchmarkRecord::from_throughput("c", StorageModel::Naive, 1024, &outcome(true, 1));

        assert_eq!(ok.status, RecordStatus::Ok);
        assert_eq!(partial.status, RecordStatus::Partial);
        assert_eq!(aborted.status, RecordStatus::Aborted);
        assert_eq!(aborted.throughput_tps, Some(0.0));
        assert_eq!(aborted.payload_bytes, 1024);
    }

    #[test]
    fn test_report_preserves_order() {
        let mut report = BenchmarkReport::new();
        report.push(BenchmarkRecord::from_throughput("first", StorageModel::Lightweight, 0, &outcome(false, 0)));
        report.push(BenchmarkRecord::failed("second", MeasurementKind::Latency, StorageModel::Lightweight, "boom"));
        report.push(BenchmarkRecord::from_throughput("third", StorageModel::Naive, 10, &outcome(false, 0)));

        let names: Vec<_> = report.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(report.throughput().count(), 2);
        assert_eq!(report.latency().count(), 1);
        assert!(!report.all_ok());
    }
}
