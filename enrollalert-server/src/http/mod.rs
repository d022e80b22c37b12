//! HTTP server layer
//!
//! Axum server with:
//! - CORS (configured origins by default)
//! - Request tracing and timeouts
//! - Per-client rate limiting
//! - Graceful shutdown
//! - JSON error responses

pub mod error;
pub mod extractors;
pub mod rate_limit;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use rate_limit::RateLimiter;
pub use server::{build_router, run_server, ApiSettings, AppState, ServerConfig, ServerError};
