//! Telemetry: structured logging and Prometheus metrics.
//!
//! - **Logging**: JSON/pretty/compact output through `tracing-subscriber`
//! - **Metrics**: ledger operation counters and durations, harness gauges
//!
//! # Example
//!
//! ```rust,no_run
//! use amprov_core::config::ObservabilityConfig;
//! use amprov_core::telemetry::init_telemetry;
//!
//! let handle = init_telemetry(&ObservabilityConfig::default()).expect("telemetry");
//! println!("{}", handle.metrics.render());
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init_metrics, HarnessMetrics, LedgerMetrics, MetricsRegistry, OperationTimer};

use crate::config::ObservabilityConfig;

/// Handle for the installed telemetry stack.
#[derive(Debug, Clone)]
pub struct TelemetryHandle {
    pub metrics: MetricsRegistry,
}

/// Initialize logging then metrics. Call once at startup.
pub fn init_telemetry(config: &ObservabilityConfig) -> anyhow::Result<TelemetryHandle> {
    init_logging(config)?;
    let metrics = init_metrics(config.metrics_enabled)?;

    Ok(TelemetryHandle { metrics })
}
