//! Configuration management commands.
//!
//! Stores CLI configuration in `~/.amprov/config.toml`.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::output::{self, OutputFormat};

/// Keys accepted by `config set` / `config get`.
const KNOWN_KEYS: &[&str] = &["api-url", "bench-config"];

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set {
        /// Configuration key (api-url, bench-config)
        key: String,
        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show all configuration
    Show,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Persistent CLI configuration stored on disk.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliConfig {
    /// Server to talk to when `--api-url` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Server config file `amprov bench` reads defaults from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bench_config: Option<String>,
}

impl CliConfig {
    fn slot(&mut self, key: &str) -> Result<&mut Option<String>> {
        match key {
            "api-url" => Ok(&mut self.api_url),
            "bench-config" => Ok(&mut self.bench_config),
            other => anyhow::bail!(
                "Unknown key '{}' (expected one of: {})",
                other,
                KNOWN_KEYS.join(", ")
            ),
        }
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        *self.slot(key)? = Some(value);
        Ok(())
    }

    pub fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.slot(key)?.clone())
    }

    fn entries(&self) -> Vec<(&'static str, &str)> {
        [("api-url", &self.api_url), ("bench-config", &self.bench_config)]
            .into_iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
            .collect()
    }
}

/// Return the path to the configuration file (`~/.amprov/config.toml`).
fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".amprov").join("config.toml"))
}

/// Load the CLI configuration from disk, returning defaults if the file does
/// not exist.
fn load_config() -> Result<CliConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Save the CLI configuration to disk, creating the directory if needed.
fn save_config(cfg: &CliConfig) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(cfg).context("Failed to serialize config")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Load the `api-url` value from the config file, if set.
pub fn load_api_url() -> Option<String> {
    load_config().ok().and_then(|cfg| cfg.api_url)
}

/// Load the `bench-config` value from the config file, if set.
pub fn load_bench_config() -> Option<String> {
    load_config().ok().and_then(|cfg| cfg.bench_config)
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Set { key, value } => {
            let mut cfg = load_config()?;
            cfg.set(&key, value.clone())?;
            save_config(&cfg)?;

            match format {
                OutputFormat::Table => output::print_success(&format!("{} = {}", key, value)),
                _ => output::print_item(&serde_json::json!({ "key": key, "value": value }), format)?,
            }
        }

        ConfigCommands::Get { key } => {
            let mut cfg = load_config()?;
            match cfg.get(&key)? {
                Some(value) => match format {
                    OutputFormat::Table => println!("{}", value),
                    _ => output::print_item(&serde_json::json!({ "key": key, "value": value }), format)?,
                },
                None => output::print_info(&format!("'{}' is not set", key)),
            }
        }

        ConfigCommands::Show => {
            let cfg = load_config()?;
            let entries = cfg.entries();

            if entries.is_empty() {
                output::print_info("No configuration values set.");
                return Ok(());
            }

            match format {
                OutputFormat::Table => {
                    output::print_header("Configuration");
                    for (k, v) in entries {
                        output::print_detail(k, v);
                    }
                }
                _ => output::print_item(&cfg, format)?,
            }
        }

        ConfigCommands::Reset { force } => {
            if !force {
                output::print_info("This will reset all CLI configuration. Use --force to confirm.");
                return Ok(());
            }

            let path = config_path()?;
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }

            output::print_success("Configuration reset to defaults");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_known_keys() {
        let mut cfg = CliConfig::default();
        cfg.set("api-url", "http://ledger:8080".into()).unwrap();

        assert_eq!(cfg.get("api-url").unwrap().as_deref(), Some("http://ledger:8080"));
        assert_eq!(cfg.get("bench-config").unwrap(), None);
        assert_eq!(cfg.entries(), vec![("api-url", "http://ledger:8080")]);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut cfg = CliConfig::default();
        let err = cfg.set("colour", "blue".into()).unwrap_err();
        assert!(err.to_string().contains("api-url"));
    }

    #[test]
    fn test_toml_uses_kebab_case_keys() {
        let cfg = CliConfig {
            api_url: Some("http://x".into()),
            bench_config: None,
        };
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("api-url"));
        assert_eq!(toml::from_str::<CliConfig>(&text).unwrap(), cfg);
    }
}
