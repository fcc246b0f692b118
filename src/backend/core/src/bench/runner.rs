//! Batched, bounded-concurrency call driver.
//!
//! `N` calls are split into consecutive batches of `C`. All calls in a batch
//! run concurrently on the current task and the driver waits for every one of
//! them before starting the next batch. No two batches overlap.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{ProvenanceError, Result};
use crate::telemetry::HarnessMetrics;

/// What to do when a call in a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop after the failing batch and report zero throughput.
    #[default]
    FailFast,
    /// Run every batch; throughput counts successful calls only.
    Isolate,
}

/// Parameters of one throughput measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputPlan {
    pub operations: usize,
    pub concurrency: usize,
    pub call_deadline: Duration,
    pub policy: FailurePolicy,
}

/// Result of one throughput measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputOutcome {
    pub operations: usize,
    pub concurrency: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Batches skipped after a fail-fast abort.
    pub abandoned: usize,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// Transactions per second; zero when a fail-fast run aborted.
    pub throughput: f64,
    pub aborted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

impl ThroughputOutcome {
    pub fn failure_rate(&self) -> f64 {
        let attempted = self.succeeded + self.failed;
        if attempted == 0 {
            0.0
        } else {
            self.failed as f64 / attempted as f64
        }
    }
}

/// Await `call`, failing it with `CallTimeout` once `deadline` passes.
pub async fn call_with_deadline<T, F>(deadline: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(ProvenanceError::call_timeout(deadline)),
    };
    HarnessMetrics::record_call(result.is_ok());
    result
}

fn per_second(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        // Sub-resolution runs still count as progress.
        count as f64 / f64::EPSILON
    }
}

/// Issue `plan.operations` calls built by `make_call(index)` in batches of
/// `plan.concurrency`.
pub async fn run_throughput<F, Fut, T>(plan: ThroughputPlan, mut make_call: F) -> Result<ThroughputOutcome>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if plan.concurrency == 0 {
        return Err(ProvenanceError::invalid_input("concurrency must be positive"));
    }

    let total_batches = plan.operations.div_ceil(plan.concurrency);
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut first_error: Option<String> = None;
    let mut aborted = false;
    let mut batches_run = 0usize;

    let start = Instant::now();

    for batch_start in (0..plan.operations).step_by(plan.concurrency) {
        let batch_end = (batch_start + plan.concurrency).min(plan.operations);
        let calls: Vec<_> = (batch_start..batch_end)
            .map(|index| call_with_deadline(plan.call_deadline, make_call(index)))
            .collect();

        let results = join_all(calls).await;
        batches_run += 1;

        for result in results {
            match result {
                Ok(_) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }
        }

        debug!(batch = batches_run, of = total_batches, succeeded, failed, "Batch complete");

        if failed > 0 && plan.policy == FailurePolicy::FailFast {
            aborted = true;
            break;
        }
    }

    let elapsed = start.elapsed();
    let throughput = if aborted { 0.0 } else { per_second(succeeded, elapsed) };

    if aborted {
        warn!(
            operations = plan.operations,
            concurrency = plan.concurrency,
            failed,
            error = ?first_error,
            "Throughput run aborted after a failed batch"
        );
    } else {
        info!(
            operations = plan.operations,
            concurrency = plan.concurrency,
            succeeded,
            failed,
            elapsed_ms = elapsed.as_millis() as u64,
            throughput,
            "Throughput run complete"
        );
    }

    Ok(ThroughputOutcome {
        operations: plan.operations,
        concurrency: plan.concurrency,
        succeeded,
        failed,
        abandoned: total_batches - batches_run,
        elapsed,
        throughput,
        aborted,
        first_error,
    })
}
