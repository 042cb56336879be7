use std::path::Path;

use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => print_config(config),
                }
                Ok(())
            }
            ConfigSubcommand::Init { force } => {
                if path.exists() && !force {
                    return Err(format!(
                        "Config file '{}' already exists. Use --force to overwrite.",
                        path.display()
                    )
                    .into());
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, Config::template())?;
                println!("✓ Wrote {}", path.display());
                Ok(())
            }
        }
    }
}

fn print_config(config: &Config) {
    println!("Configuration");
    println!("=============\n");

    if let Some(path) = &config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!(
            "Config file: {} (not found)",
            Config::default_config_path().display()
        );
    }
    println!();

    println!("data_dir: {}", config.data_dir.value.display());
    println!("  source: {}", config.data_dir.source);
    println!();

    println!("namespace: {}", config.namespace.value);
    println!("  source: {}", config.namespace.source);
    println!();

    println!(
        "api.base_url: {}",
        config.api.base_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "api.api_key: {}",
        if config.api.api_key.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!("api.timeout_secs: {}", config.api.timeout_secs);
    println!("api.health_path: {}", config.api.health_path);
    println!();

    println!("storage.capacity_bytes: {}", config.storage.capacity_bytes);
    println!("storage.warn_percent: {}", config.storage.warn_percent);
    println!();

    println!("sync.auto_sync: {}", config.sync.auto_sync);
    println!("sync.poll_interval_secs: {}", config.sync.poll_interval_secs);
    println!("sync.lease_ttl_secs: {}", config.sync.lease_ttl_secs);
    let mut endpoints: Vec<_> = config.sync.endpoints.iter().collect();
    endpoints.sort_by_key(|(t, _)| t.to_string());
    for (mutation_type, endpoint) in endpoints {
        println!("sync.endpoints.{}: {}", mutation_type, endpoint);
    }
}
