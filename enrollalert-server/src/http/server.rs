//! Axum server setup
//!
//! Server skeleton with:
//! - Configured-origins CORS by default
//! - Tracing and request-timeout middleware
//! - Per-client rate limiting on the section and delete routes
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Uri};
use axum::Router;
use enrollalert_core::config::{AppConfig, ServerSection};
use enrollalert_core::Term;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::rate_limit::RateLimiter;
use super::routes;
use crate::auth::IdentityVerifier;
use crate::db::Database;
use crate::email::Mailer;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3030)
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = configured origins only)
    ///
    /// WARNING: Setting this to true allows any origin.
    /// Only use for development.
    pub cors_permissive: bool,

    pub allowed_origins: Vec<String>,

    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn from_config(section: &ServerSection) -> Self {
        Self {
            bind_addr: section.bind,
            cors_permissive: section.cors_permissive,
            allowed_origins: section.allowed_origins.clone(),
            request_timeout: Duration::from_secs(section.request_timeout_secs),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_config(&ServerSection::default())
    }
}

/// Settings handlers need per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSettings {
    /// Term all catalog queries are scoped to
    pub term: Term,
    pub max_saved_alerts: u32,
}

impl ApiSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            term: config.catalog.term,
            max_saved_alerts: config.limits.max_saved_alerts,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub settings: ApiSettings,
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "CORS: ignoring invalid origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// JSON 404 for paths no route matches
async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::NotFound {
        path: uri.path().to_owned(),
    }
}

/// Build the full API router.
pub fn build_router(state: AppState, config: &ServerConfig, limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::courses::router())
        .merge(routes::catalog::router())
        .merge(routes::sections::router(Arc::clone(&limiter)))
        .merge(routes::notifications::router(limiter))
        .merge(routes::welcome::router())
        .fallback(route_not_found)
        .layer(cors_layer(config))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run the HTTP server.
///
/// # Example
///
/// ```ignore
/// let state = AppState { db, verifier, mailer, settings };
/// run_server(state, ServerConfig::from_config(&config.server), limiter).await?;
/// ```
pub async fn run_server(
    state: AppState,
    config: ServerConfig,
    limiter: RateLimiter,
) -> Result<(), ServerError> {
    let limiter = Arc::new(limiter);
    let sweeper = limiter.spawn_sweeper();

    let app = build_router(state, &config, limiter);

    // Bind listener
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    // Peer addresses feed the rate limiter when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
