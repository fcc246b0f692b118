//! Configuration management.

use std::time::Duration;

use serde::Deserialize;

use crate::bench::FailurePolicy;
use crate::error::{ProvenanceError, Result};
use crate::ledger::StagePolicy;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// State store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Ledger behaviour
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Benchmark harness defaults
    #[serde(default)]
    pub bench: BenchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which key-value store backs the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix applied to every key written to Redis
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Transaction id generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxIdStrategy {
    #[default]
    Uuid,
    Sequential,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Identity stamped on every transaction context
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Whether lifecycle transitions are enforced
    #[serde(default)]
    pub stage_policy: StagePolicy,

    /// How transaction ids are minted
    #[serde(default)]
    pub tx_ids: TxIdStrategy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            stage_policy: StagePolicy::default(),
            tx_ids: TxIdStrategy::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Install the Prometheus recorder and serve /metrics
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    /// Operations per throughput measurement
    #[serde(default = "default_operations")]
    pub operations: usize,

    /// Concurrency levels to sweep
    #[serde(default = "default_concurrency_levels")]
    pub concurrency_levels: Vec<usize>,

    /// Inline payload sizes in bytes for the naive model
    #[serde(default = "default_payload_sizes")]
    pub payload_sizes: Vec<usize>,

    /// History lengths for the latency measurement
    #[serde(default = "default_history_lengths")]
    pub history_lengths: Vec<usize>,

    /// Deadline applied to each submitted call
    #[serde(default = "default_call_deadline", with = "humantime_serde")]
    pub call_deadline: Duration,

    /// Pause between history-building updates
    #[serde(default = "default_inter_call_delay", with = "humantime_serde")]
    pub inter_call_delay: Duration,

    /// Abort on first failure or keep going
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Seed for payload generation; random when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            operations: default_operations(),
            concurrency_levels: default_concurrency_levels(),
            payload_sizes: default_payload_sizes(),
            history_lengths: default_history_lengths(),
            call_deadline: default_call_deadline(),
            inter_call_delay: default_inter_call_delay(),
            failure_policy: FailurePolicy::default(),
            seed: None,
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_key_prefix() -> String { "amprov:".to_string() }
fn default_identity() -> String { "Org1MSP".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_metrics_enabled() -> bool { true }
fn default_operations() -> usize { 1000 }
fn default_concurrency_levels() -> Vec<usize> { vec![100] }
fn default_payload_sizes() -> Vec<usize> { vec![0, 1024, 10 * 1024, 100 * 1024, 1024 * 1024, 2 * 1024 * 1024] }
fn default_history_lengths() -> Vec<usize> { vec![10, 50, 100, 200] }
fn default_call_deadline() -> Duration { Duration::from_secs(30) }
fn default_inter_call_delay() -> Duration { Duration::from_millis(20) }

fn environment() -> config::Environment {
    config::Environment::with_prefix("AMPROV")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("bench.concurrency_levels")
        .with_list_parse_key("bench.payload_sizes")
        .with_list_parse_key("bench.history_lengths")
}

impl Config {
    /// Load configuration from environment.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<()> {
        if self.ledger.identity.trim().is_empty() {
            return Err(ProvenanceError::configuration("ledger.identity must not be empty"));
        }
        if self.bench.operations == 0 {
            return Err(ProvenanceError::configuration("bench.operations must be positive"));
        }
        if self.bench.concurrency_levels.iter().any(|&c| c == 0) {
            return Err(ProvenanceError::configuration("bench.concurrency levels must be positive"));
        }
        if self.bench.history_lengths.iter().any(|&l| l == 0) {
            return Err(ProvenanceError::configuration("bench.history_lengths must be positive"));
        }
        if self.bench.call_deadline.is_zero() {
            return Err(ProvenanceError::configuration("bench.call_deadline must be non-zero"));
        }
        Ok(())
    }
}
