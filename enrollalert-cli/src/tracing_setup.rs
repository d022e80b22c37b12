//! Tracing setup for the enrollalert CLI
//!
//! Usage:
//!   enrollalert --debug serve                    # Debug logging to console
//!   RUST_LOG=enrollalert_server=debug enrollalert  # Fine-grained log control
//!
//! Environment variables:
//!   RUST_LOG    # Log filter (default: info, sqlx statement logs at warn)

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Enable debug logging (sets debug level if RUST_LOG is not set)
    pub debug: bool,
}

fn default_filter(debug: bool) -> EnvFilter {
    let level = if debug { "debug" } else { "info" };
    // sqlx logs every statement at info
    EnvFilter::new(format!("{level},sqlx=warn"))
}

/// Initialize console tracing. RUST_LOG wins over `--debug` when set.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config.debug));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug) // Show targets in debug mode
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
