//! API error types with IntoResponse
//!
//! Errors are converted to JSON `{error, message}` bodies with appropriate
//! status codes. Server-side failures are logged here and reach the client
//! only as a generic message.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::AuthError;
use crate::db::DbError;
use crate::models::ValidationError;

/// Seconds a client should wait after a busy response
const BUSY_RETRY_AFTER_SECS: u64 = 1;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Missing or rejected credentials (401)
    Unauthorized { reason: String },

    /// No such route (404)
    NotFound { path: String },

    /// Request repeats existing state (409)
    Conflict { message: String },

    /// Saving would exceed the per-user alert cap (422)
    AlertLimit { limit: u32, current: usize },

    /// Too many requests from this client (429)
    RateLimited { retry_after_secs: u64 },

    /// Database stayed saturated through every retry (503)
    Busy,

    /// An upstream service failed (502)
    Upstream { message: String },

    /// The mail could not be sent (502)
    EmailFailed { message: String },

    /// Database error (500, logged)
    Database(DbError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::AlertLimit { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Busy => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } | Self::EmailFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            Self::Busy => Some(BUSY_RETRY_AFTER_SECS),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = self.retry_after();

        let body = match &self {
            Self::Validation(e) => json!({
                "error": "validation_error",
                "message": e.to_string()
            }),
            Self::Unauthorized { reason } => {
                tracing::debug!(%reason, "rejected credentials");
                json!({
                    "error": "unauthorized",
                    "message": "missing or invalid credentials"
                })
            }
            Self::NotFound { path } => json!({
                "error": "not_found",
                "message": format!("no route for '{}'", path)
            }),
            Self::Conflict { message } => json!({
                "error": "conflict",
                "message": message
            }),
            Self::AlertLimit { limit, current } => json!({
                "error": "alert_limit_exceeded",
                "message": format!("you can save at most {} alerts ({} saved)", limit, current),
                "limit": limit
            }),
            Self::RateLimited { retry_after_secs } => json!({
                "error": "rate_limited",
                "message": "too many requests, please slow down",
                "retry_after": retry_after_secs
            }),
            Self::Busy => json!({
                "error": "busy",
                "message": "server is busy, please retry shortly"
            }),
            Self::Upstream { message } => {
                tracing::error!("Upstream error: {}", message);
                json!({
                    "error": "upstream_error",
                    "message": "an upstream service is unavailable"
                })
            }
            Self::EmailFailed { message } => {
                tracing::error!("Email error: {}", message);
                json!({
                    "error": "email_failed",
                    "message": "the email could not be sent"
                })
            }
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                json!({
                    "error": "internal_error",
                    "message": "an internal error occurred"
                })
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Busy { .. } => Self::Busy,
            _ => Self::Database(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::KeyFetch(message) => Self::Upstream { message },
            other => Self::Unauthorized {
                reason: other.to_string(),
            },
        }
    }
}
