//! Config inspection command

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use enrollalert_core::AppConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective config (file + environment), secrets masked
    Show,
    /// Check that the server could start with this config
    Validate,
    /// Show config file path
    Path,
}

pub fn run_config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let config = AppConfig::load(config_path)?;
            print!("{}", config.to_redacted_toml()?);
        }
        ConfigCommands::Validate => {
            AppConfig::load(config_path)?.validate()?;
            println!("✓ Config is valid");
        }
        ConfigCommands::Path => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(AppConfig::config_path);
            let status = if path.exists() { "" } else { " (not found)" };
            println!("{}{}", path.display(), status);
        }
    }
    Ok(())
}
