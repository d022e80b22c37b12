//! Database connection pool management
//!
//! Uses sqlx PgPool with explicit connection limits.

use std::time::Duration;

use enrollalert_core::config::DatabaseSection;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

fn pool_options(config: &DatabaseSection) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
}

/// Create a PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the first connection fails.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(&config.database).await?;
/// ```
pub async fn create_pool(config: &DatabaseSection) -> Result<PgPool, sqlx::Error> {
    pool_options(config).connect(&config.url).await
}

/// Create a pool that connects on first use.
///
/// Only fails if the URL cannot be parsed.
pub fn create_lazy_pool(config: &DatabaseSection) -> Result<PgPool, sqlx::Error> {
    pool_options(config).connect_lazy(&config.url)
}
