//! Asset commands.
//!
//! Records lifecycle events against the server and reads assets back.

use amprov_core::gateway::ProvenanceGateway;
use amprov_core::ledger::{
    AssetHistory, Evidence, MaterialCertification, ProductionCompletion, ProductionStart,
    QaCertification,
};
use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, RemoteGateway};
use crate::output::{self, OutputFormat};

/// Evidence attached to an event. Exactly one form is required; an inline
/// payload stores the asset under the naive model.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct EvidenceArgs {
    /// Hash of the off-chain evidence document
    #[arg(long)]
    hash: Option<String>,

    /// Evidence stored inline on the ledger (naive model)
    #[arg(long)]
    payload: Option<String>,
}

impl EvidenceArgs {
    fn into_evidence(self) -> Evidence {
        match (self.hash, self.payload) {
            (_, Some(payload)) => Evidence::InlinePayload(payload),
            (Some(hash), None) => Evidence::OffChainHash(hash),
            (None, None) => Evidence::OffChainHash(String::new()),
        }
    }
}

#[derive(Subcommand)]
pub enum AssetCommands {
    /// Certify a material batch (creates the asset)
    Certify {
        /// Asset ID
        asset_id: String,
        #[arg(long, default_value = "")]
        material_type: String,
        #[arg(long, default_value = "")]
        batch: String,
        #[arg(long, default_value = "")]
        supplier: String,
        #[command(flatten)]
        evidence: EvidenceArgs,
    },

    /// Start a print job (creates the asset)
    Start {
        /// Asset ID
        asset_id: String,
        #[arg(long, default_value = "")]
        machine: String,
        #[arg(long, default_value = "")]
        batch: String,
        #[arg(long, default_value = "")]
        design_hash: String,
        #[arg(long, default_value = "")]
        design_version: String,
        #[arg(long, default_value = "")]
        job: String,
        #[command(flatten)]
        evidence: EvidenceArgs,
    },

    /// Complete a print job
    Complete {
        /// Stored asset ID (naive assets carry the NAIVE_ prefix)
        asset_id: String,
        #[arg(long, default_value = "")]
        job: String,
        #[arg(long, default_value = "")]
        inspection: String,
        #[command(flatten)]
        evidence: EvidenceArgs,
    },

    /// Record the QA verdict
    Qa {
        /// Stored asset ID (naive assets carry the NAIVE_ prefix)
        asset_id: String,
        #[arg(long, default_value = "")]
        standard: String,
        /// CERTIFIED_FIT_FOR_USE passes; anything else rejects
        #[arg(long)]
        result: String,
        #[arg(long, default_value = "")]
        certificate: String,
        #[command(flatten)]
        evidence: EvidenceArgs,
    },

    /// Show an asset
    Show {
        /// Stored asset ID
        asset_id: String,
    },

    /// Show an asset's provenance history
    History {
        /// Stored asset ID
        asset_id: String,
    },

    /// Check whether an asset exists
    Exists {
        /// Stored asset ID
        asset_id: String,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct HistoryRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Tx ID")]
    tx_id: String,
    #[tabled(rename = "Event")]
    event_type: String,
    #[tabled(rename = "Agent")]
    agent: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
}

fn history_rows(history: &AssetHistory) -> Vec<HistoryRow> {
    history
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| HistoryRow {
            position: i + 1,
            tx_id: entry.tx_id.clone(),
            event_type: entry.event.event_type.to_string(),
            agent: entry.event.agent_id.clone(),
            timestamp: entry.event.timestamp.to_rfc3339(),
        })
        .collect()
}

fn print_receipt(action: &str, asset_id: &str, tx_id: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_success(&format!("{} {} in tx {}", action, asset_id, tx_id));
            Ok(())
        }
        _ => output::print_item(
            &serde_json::json!({ "asset_id": asset_id, "tx_id": tx_id }),
            format,
        ),
    }
}

pub async fn execute(cmd: AssetCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let gateway = RemoteGateway::new(client.clone());

    match cmd {
        AssetCommands::Certify {
            asset_id,
            material_type,
            batch,
            supplier,
            evidence,
        } => {
            let evidence = evidence.into_evidence();
            let stored_id = evidence.model().asset_key(&asset_id);
            let tx_id = gateway
                .certify_material(MaterialCertification {
                    asset_id,
                    material_type,
                    material_batch_id: batch,
                    supplier_id: supplier,
                    evidence,
                })
                .await?;
            print_receipt("Certified", &stored_id, &tx_id, format)?;
        }

        AssetCommands::Start {
            asset_id,
            machine,
            batch,
            design_hash,
            design_version,
            job,
            evidence,
        } => {
            let evidence = evidence.into_evidence();
            let stored_id = evidence.model().asset_key(&asset_id);
            let tx_id = gateway
                .start_production(ProductionStart {
                    asset_id,
                    machine_id: machine,
                    material_batch_used_id: batch,
                    design_file_hash: design_hash,
                    design_file_version: design_version,
                    build_job_id: job,
                    evidence,
                })
                .await?;
            print_receipt("Started production of", &stored_id, &tx_id, format)?;
        }

        AssetCommands::Complete {
            asset_id,
            job,
            inspection,
            evidence,
        } => {
            let tx_id = gateway
                .complete_production(ProductionCompletion {
                    asset_id: asset_id.clone(),
                    build_job_id: job,
                    inspection_result: inspection,
                    evidence: evidence.into_evidence(),
                })
                .await?;
            print_receipt("Completed production of", &asset_id, &tx_id, format)?;
        }

        AssetCommands::Qa {
            asset_id,
            standard,
            result,
            certificate,
            evidence,
        } => {
            let tx_id = gateway
                .qa_certify(QaCertification {
                    asset_id: asset_id.clone(),
                    test_standard: standard,
                    test_result: result,
                    certificate_id: certificate,
                    evidence: evidence.into_evidence(),
                })
                .await?;
            print_receipt("Recorded QA for", &asset_id, &tx_id, format)?;
        }

        AssetCommands::Show { asset_id } => {
            let asset = gateway.read_asset(&asset_id).await?;
            match format {
                OutputFormat::Table => {
                    output::print_header(&format!("Asset {}", asset.asset_id));
                    output::print_detail("Owner", &asset.owner);
                    output::print_detail(
                        "Stage",
                        &output::status_colored(asset.current_lifecycle_stage.as_str()),
                    );
                    output::print_detail("Model", &asset.model().to_string());
                    output::print_detail("History", &asset.history_tx_ids.len().to_string());
                }
                _ => output::print_item(&asset, format)?,
            }
        }

        AssetCommands::History { asset_id } => {
            let history = gateway.get_asset_history(&asset_id).await?;
            match format {
                OutputFormat::Table => {
                    output::print_header(&format!("History of {}", history.asset_id));
                    output::print_table(&history_rows(&history));
                    for skipped in &history.skipped {
                        output::print_warning(&format!(
                            "entry {} ({}) skipped: {}",
                            skipped.position + 1,
                            skipped.tx_id,
                            skipped.reason
                        ));
                    }
                }
                _ => output::print_item(&history, format)?,
            }
        }

        AssetCommands::Exists { asset_id } => {
            let exists = gateway.asset_exists(&asset_id).await?;
            match format {
                OutputFormat::Table => println!("{}", exists),
                _ => output::print_item(
                    &serde_json::json!({ "asset_id": asset_id, "exists": exists }),
                    format,
                )?,
            }
        }
    }

    Ok(())
}
