//! Validation subcommand

use super::download::resolve_config;
use super::CliError;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Validate command for checking the effective configuration
#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// What to validate
    #[command(subcommand)]
    pub target: ValidateTarget,
}

/// Target type for validation
#[derive(clap::Subcommand, Debug)]
pub enum ValidateTarget {
    /// Resolve file + environment configuration, validate it and print it
    Config {
        /// Also write the resolved configuration to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

impl ValidateCommand {
    /// Execute the validation command
    pub async fn execute(&self, config_path: Option<&Path>) -> Result<(), CliError> {
        match &self.target {
            ValidateTarget::Config { save } => self.validate_config(config_path, save.as_deref()),
        }
    }

    fn validate_config(&self, config_path: Option<&Path>, save: Option<&Path>) -> Result<(), CliError> {
        let config = resolve_config(config_path)?;

        let rendered = serde_json::to_string_pretty(&config)
            .map_err(|e| CliError::ConfigError(e.into()))?;
        println!("Configuration is valid:");
        println!("{rendered}");

        if let Some(path) = save {
            config.save(path)?;
            println!("Saved to {}", path.display());
        }
        Ok(())
    }
}
