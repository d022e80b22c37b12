//! Database layer - connection pool, query guard and repositories
//!
//! # Design Principles
//!
//! - Every query goes through [`Database::run`], which caps how many run at
//!   once and retries pool exhaustion with linear backoff
//! - List operations use JOINs and window counts - no N+1 queries
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for multi-step operations

pub mod database;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repos;

pub use database::{Database, QueryGuard, RetryPolicy};
pub use error::DbError;
pub use pool::{create_lazy_pool, create_pool};
pub use repos::*;
