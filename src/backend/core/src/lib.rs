#![allow(clippy::result_large_err)]
//! # Amprov Core
//!
//! Provenance ledger for additive-manufacturing parts, plus the harness that
//! benchmarks it.
//!
//! ## Architecture
//!
//! - **Ledger**: write-once provenance events and asset records with a
//!   lifecycle state machine, over a pluggable key-value store
//! - **Store**: in-memory (`DashMap`) and Redis backends with atomic
//!   create and compare-and-put
//! - **Gateway**: the call surface shared by the HTTP API and the harness
//! - **Bench**: bounded-concurrency throughput and history-read latency sweeps
//! - **API**: axum HTTP surface with Prometheus metrics
//! - **Telemetry**: structured logging and metrics

pub mod api;
pub mod bench;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod store;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, ProvenanceError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bench::{BenchPlan, BenchmarkReport, BenchmarkSuite, FailurePolicy};
    pub use crate::config::Config;
    pub use crate::error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, ProvenanceError, Result};
    pub use crate::gateway::{LocalGateway, ProvenanceGateway};
    pub use crate::ledger::{
        Asset, AssetHistory, AssetLedger, ContextFactory, Evidence, LifecycleStage,
        MaterialCertification, ProductionCompletion, ProductionStart, ProvenanceEvent,
        QaCertification, StagePolicy, StorageModel,
    };
    pub use crate::store::{InMemoryStore, RedisStore, StateStore};
}
