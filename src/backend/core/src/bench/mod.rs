//! Benchmark harness.
//!
//! Drives a [`ProvenanceGateway`](crate::gateway::ProvenanceGateway) under
//! controlled load:
//! - **runner**: batched bounded-concurrency writes, throughput
//! - **latency**: history synthesis and timed history reads
//! - **payload**: synthetic hashes and inline payloads
//! - **suite**: the configured sweep, collected into a [`BenchmarkReport`]

pub mod latency;
pub mod payload;
pub mod report;
pub mod runner;
pub mod suite;

pub use latency::{build_history, measure_history_latency, LatencySample};
pub use payload::PayloadGenerator;
pub use report::{BenchmarkRecord, BenchmarkReport, MeasurementKind, RecordStatus};
pub use runner::{call_with_deadline, run_throughput, FailurePolicy, ThroughputOutcome, ThroughputPlan};
pub use suite::{BenchPlan, BenchmarkSuite};
