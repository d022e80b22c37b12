//! HTTP server command
//!
//! Loads config, connects to Postgres, applies migrations and runs the API
//! until Ctrl+C/SIGTERM.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use enrollalert_core::AppConfig;
use enrollalert_server::db::{create_pool, migrations};
use enrollalert_server::{
    mailer_from_config, run_server, ApiSettings, AppState, Database, FirebaseVerifier, Mailer,
    RateLimiter, ServerConfig,
};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config; default 127.0.0.1:3030)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config/environment)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Don't apply migrations on startup
    #[arg(long)]
    pub skip_migrations: bool,
}

/// Command-line flags win over file and environment settings.
fn apply_overrides(config: &mut AppConfig, args: &ServeArgs) {
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if args.cors_permissive {
        config.server.cors_permissive = true;
    }
    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    tracing::info!(
        bind = %config.server.bind,
        term = %config.catalog.term,
        "Starting enrollalert server"
    );

    // Create database pool
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;

    if args.skip_migrations {
        tracing::info!("Skipping migrations");
    } else {
        migrations::run(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let mailer: Arc<dyn Mailer> = Arc::from(
        mailer_from_config(&config.email).context("Invalid email configuration")?,
    );

    let state = AppState {
        db: Database::from_config(pool, &config.database),
        verifier: Arc::new(FirebaseVerifier::from_config(&config.auth)),
        mailer,
        settings: ApiSettings::from_config(&config),
    };

    // Run server (blocks until shutdown)
    run_server(
        state,
        ServerConfig::from_config(&config.server),
        RateLimiter::from_config(&config.limits),
    )
    .await
    .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServeArgs {
        ServeArgs::try_parse_from(std::iter::once("serve").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        let args = parse(&[
            "--bind",
            "0.0.0.0:8080",
            "--cors-permissive",
            "--database-url",
            "postgres://localhost/enrollalert",
        ]);
        apply_overrides(&mut config, &args);

        assert_eq!(config.server.bind.port(), 8080);
        assert!(config.server.cors_permissive);
        assert_eq!(config.database.url, "postgres://localhost/enrollalert");
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut config = AppConfig::default();
        config.database.url = "postgres://from-file/db".into();
        let args = ServeArgs {
            bind: None,
            cors_permissive: false,
            database_url: None,
            skip_migrations: false,
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.server.bind.port(), 3030);
        assert!(!config.server.cors_permissive);
        assert_eq!(config.database.url, "postgres://from-file/db");
    }
}
