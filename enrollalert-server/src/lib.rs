//! enrollalert-server: HTTP API for course search and seat alerts
//!
//! Serves the catalog (courses, sections, subjects, breadths) and lets
//! signed-in students save and remove seat-availability alerts. The
//! watcher that actually sends alert mail lives elsewhere and reads the
//! same tables.

pub mod auth;
pub mod db;
pub mod email;
pub mod http;
pub mod models;

pub use auth::{FirebaseVerifier, IdentityVerifier};
pub use db::{Database, DbError};
pub use email::{mailer_from_config, Mailer};
pub use http::{build_router, run_server, ApiSettings, AppState, RateLimiter, ServerConfig};
