//! Prometheus metrics for ledger operations and the benchmark harness.
//!
//! Metric recording goes through the `metrics` facade, so every helper here is
//! a no-op until [`init_metrics`] installs a recorder.

use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Handle for rendering the installed recorder.
#[derive(Clone)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry with nothing installed; `render` yields an empty string.
    pub fn disabled() -> Self {
        Self {
            prometheus_handle: None,
        }
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }
}

/// Install the Prometheus recorder.
pub fn init_metrics(enabled: bool) -> anyhow::Result<MetricsRegistry> {
    if !enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[
            0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ])?
        .install_recorder()?;

    register_metric_descriptions();

    tracing::info!("Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!(
        "amprov_ledger_operations_total",
        "Ledger operations by operation name and outcome"
    );
    describe_histogram!(
        "amprov_ledger_operation_duration_seconds",
        "Ledger operation duration in seconds"
    );
    describe_counter!(
        "amprov_history_entries_skipped_total",
        "History entries omitted because they were missing or undecodable"
    );
    describe_counter!("amprov_errors_total", "Errors by code, category, and severity");

    describe_gauge!(
        "amprov_bench_throughput_tps",
        "Throughput of the most recent benchmark run"
    );
    describe_gauge!(
        "amprov_bench_latency_seconds",
        "Latency of the most recent history query benchmark"
    );
    describe_counter!(
        "amprov_bench_calls_total",
        "Benchmark calls submitted, by outcome"
    );
}

/// Ledger-level recording helpers.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record the outcome of one ledger operation.
    pub fn record_operation(operation: &'static str, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "failure" };
        counter!(
            "amprov_ledger_operations_total",
            "operation" => operation,
            "outcome" => outcome,
        )
        .increment(1);
        histogram!(
            "amprov_ledger_operation_duration_seconds",
            "operation" => operation,
        )
        .record(duration.as_secs_f64());
    }

    pub fn record_history_skipped(count: usize) {
        if count > 0 {
            counter!("amprov_history_entries_skipped_total").increment(count as u64);
        }
    }
}

/// Harness-level recording helpers.
pub struct HarnessMetrics;

impl HarnessMetrics {
    pub fn record_call(success: bool) {
        let outcome = if success { "success" } else { "failure" };
        counter!("amprov_bench_calls_total", "outcome" => outcome).increment(1);
    }

    pub fn set_throughput(name: &str, tps: f64) {
        gauge!("amprov_bench_throughput_tps", "benchmark" => name.to_string()).set(tps);
    }

    pub fn set_latency(history_length: usize, latency: Duration) {
        gauge!(
            "amprov_bench_latency_seconds",
            "history_length" => history_length.to_string(),
        )
        .set(latency.as_secs_f64());
    }
}

/// Times a ledger operation and records it on `finish`.
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record the operation outcome and pass the result through.
    pub fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E> {
        LedgerMetrics::record_operation(self.operation, result.is_ok(), self.start.elapsed());
        result
    }
}
