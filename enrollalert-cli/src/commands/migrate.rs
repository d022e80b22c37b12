//! Schema migration command

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use enrollalert_core::AppConfig;
use enrollalert_server::db::{create_pool, migrations};

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
}

pub async fn run_migrate(args: MigrateArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = AppConfig::load(config_path)?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    if config.database.url.trim().is_empty() {
        anyhow::bail!("DATABASE_URL not set. Set via --database-url, DATABASE_URL env, or the config file");
    }

    let pool = create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;
    migrations::run(&pool)
        .await
        .context("Failed to run migrations")?;

    println!("✓ Migrations applied");
    Ok(())
}
