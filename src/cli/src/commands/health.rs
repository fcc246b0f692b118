//! Health check command.
//!
//! Queries the `/health` endpoint, and optionally `/metrics`.

use anyhow::Result;
use clap::Args;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {
    /// Also report how many Prometheus series the server exposes
    #[arg(short, long)]
    detailed: bool,
}

fn field<'a>(health: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    health.get(key).and_then(|v| v.as_str())
}

pub async fn execute(args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.get_raw(&["health"]).await?;

    match format {
        OutputFormat::Table => {
            let status = field(&health, "status").unwrap_or("unknown");

            output::print_header("Server Health");
            output::print_detail("Status", status);
            output::print_detail("API URL", client.base_url());

            for (label, key) in [("Version", "version"), ("Gateway", "gateway"), ("Timestamp", "timestamp")] {
                if let Some(value) = field(&health, key) {
                    output::print_detail(label, value);
                }
            }

            if args.detailed {
                let metrics = client.get_text(&["metrics"]).await?;
                let series = metrics
                    .lines()
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .count();
                output::print_detail("Metric series", &series.to_string());
            }

            if status == "healthy" {
                output::print_success("Ledger is serving requests");
            } else {
                output::print_error(&format!("Server status: {}", status));
            }
            Ok(())
        }
        _ => output::print_item(&health, format),
    }
}
