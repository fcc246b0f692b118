//! Benchmark command.
//!
//! Runs the configured sweep against the API server, or with `--local`
//! against an in-process in-memory ledger.

use amprov_core::bench::{BenchmarkRecord, BenchmarkReport, BenchmarkSuite, FailurePolicy};
use amprov_core::config::Config;
use amprov_core::gateway::{LocalGateway, ProvenanceGateway};
use amprov_core::ledger::StagePolicy;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;

use super::config;
use crate::client::{ApiClient, RemoteGateway};
use crate::output::{self, OutputFormat};

/// Restrict a run to one kind of measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Measurement {
    /// Lightweight and naive creation throughput
    Throughput,
    /// History-read latency
    Latency,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Run against an in-process in-memory ledger instead of the server
    #[arg(long)]
    local: bool,

    /// Server configuration file to take bench defaults from
    #[arg(short, long)]
    config: Option<String>,

    /// Calls per throughput measurement
    #[arg(short = 'n', long)]
    operations: Option<usize>,

    /// Concurrency levels for the lightweight sweep (comma separated)
    #[arg(long, value_delimiter = ',')]
    concurrency: Option<Vec<usize>>,

    /// Inline payload sizes in bytes for the naive sweep (comma separated)
    #[arg(long, value_delimiter = ',')]
    payload_sizes: Option<Vec<usize>>,

    /// History lengths for the latency sweep (comma separated)
    #[arg(long, value_delimiter = ',')]
    history_lengths: Option<Vec<usize>>,

    /// Per-call deadline in seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Pause between history-building calls in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Only take one kind of measurement
    #[arg(long, value_enum)]
    only: Option<Measurement>,

    /// Keep going after failed calls instead of aborting the measurement
    #[arg(long)]
    isolate: bool,

    /// Seed for synthetic payloads
    #[arg(long)]
    seed: Option<u64>,
}

impl BenchArgs {
    fn load_config(&self) -> Result<Config> {
        let path = self.config.clone().or_else(config::load_bench_config);
        let mut config = match path {
            Some(path) => Config::from_file(&path)?,
            None => Config::load().unwrap_or_default(),
        };

        let bench = &mut config.bench;
        if let Some(operations) = self.operations {
            bench.operations = operations;
        }
        if let Some(levels) = &self.concurrency {
            bench.concurrency_levels = levels.clone();
        }
        if let Some(sizes) = &self.payload_sizes {
            bench.payload_sizes = sizes.clone();
        }
        if let Some(lengths) = &self.history_lengths {
            bench.history_lengths = lengths.clone();
        }
        if let Some(secs) = self.deadline_secs {
            bench.call_deadline = Duration::from_secs(secs);
        }
        if let Some(ms) = self.delay_ms {
            bench.inter_call_delay = Duration::from_millis(ms);
        }
        if self.isolate {
            bench.failure_policy = FailurePolicy::Isolate;
        }
        if self.seed.is_some() {
            bench.seed = self.seed;
        }
        match self.only {
            Some(Measurement::Throughput) => bench.history_lengths.clear(),
            Some(Measurement::Latency) => {
                bench.concurrency_levels.clear();
                bench.payload_sizes.clear();
            }
            None => {}
        }

        config.validate().context("Invalid benchmark configuration")?;
        Ok(config)
    }
}

#[derive(Debug, Serialize, Tabled)]
struct RecordRow {
    #[tabled(rename = "Benchmark")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Concurrency")]
    concurrency: usize,
    #[tabled(rename = "OK / Failed")]
    calls: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&BenchmarkRecord> for RecordRow {
    fn from(record: &BenchmarkRecord) -> Self {
        let result = match (record.throughput_tps, record.latency_ms) {
            (Some(tps), _) => format!("{:.1} tx/s", tps),
            (None, Some(ms)) => format!("{:.2} ms", ms),
            (None, None) => "-".to_string(),
        };
        let status = serde_json::to_value(record.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        Self {
            name: record.name.clone(),
            model: record.model.to_string(),
            concurrency: record.concurrency,
            calls: format!("{} / {}", record.succeeded, record.failed),
            result,
            status: output::status_colored(&status),
        }
    }
}

fn print_report(report: &BenchmarkReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_header("Benchmark Results");
            let rows: Vec<RecordRow> = report.records.iter().map(RecordRow::from).collect();
            output::print_table(&rows);
            for record in &report.records {
                if let Some(error) = &record.error {
                    output::print_warning(&format!("{}: {}", record.name, error));
                }
            }
            Ok(())
        }
        _ => output::print_item(report, format),
    }
}

pub async fn execute(args: BenchArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let config = args.load_config()?;

    // Building multi-entry histories requires unconditional stage overwrites.
    let gateway: Arc<dyn ProvenanceGateway> = if args.local {
        Arc::new(LocalGateway::in_memory(
            config.ledger.identity.clone(),
            StagePolicy::Legacy,
        ))
    } else {
        Arc::new(RemoteGateway::new(client.clone()))
    };

    let target = if args.local { "in-process ledger" } else { client.base_url() };
    if format == OutputFormat::Table {
        output::print_info(&format!(
            "Running {} operations per throughput measurement against {}",
            config.bench.operations, target
        ));
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .context("Invalid progress template")?,
    );
    spinner.set_message("Benchmarking");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let suite = BenchmarkSuite::from_config(gateway, &config.bench);
    let run_id = suite.run_id().to_string();
    let result = suite.run().await;
    spinner.finish_and_clear();

    let report = result?;
    print_report(&report, format)?;

    if format == OutputFormat::Table {
        if report.all_ok() {
            output::print_success(&format!("Run {} complete", run_id));
        } else {
            output::print_warning(&format!("Run {} finished with failures", run_id));
        }
    }

    Ok(())
}
