//! Amprov CLI - Command-line interface for the provenance ledger.
//!
//! Provides asset, benchmark, health, and configuration commands.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{asset, bench, config, health};
use output::OutputFormat;

/// Amprov - additive-manufacturing provenance ledger CLI
#[derive(Parser)]
#[command(
    name = "amprov",
    version,
    about = "Amprov - additive-manufacturing provenance ledger",
    long_about = "Record and inspect part provenance, and benchmark the ledger's write throughput and history-read latency.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "AMPROV_API_URL")]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record lifecycle events and inspect assets
    #[command(subcommand)]
    Asset(asset::AssetCommands),

    /// Run the benchmark suite
    Bench(bench::BenchArgs),

    /// Check server health
    Health(health::HealthArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(config::load_api_url)
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let client = client::ApiClient::new(&api_url)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Asset(cmd) => asset::execute(cmd, &client, format).await,
        Commands::Bench(args) => bench::execute(args, &client, format).await,
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
