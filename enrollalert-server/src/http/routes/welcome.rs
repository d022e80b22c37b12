//! Welcome email endpoint

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::db::repos::UserRepo;
use crate::email::welcome_email;
use crate::http::error::ApiError;
use crate::http::extractors::AuthUser;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub ok: bool,
    /// False when the mail went out earlier or there is no address on file
    pub sent: bool,
}

/// POST /api/welcome - send the welcome mail at most once per user
async fn send_welcome(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<WelcomeResponse>, ApiError> {
    let users = UserRepo::new(&state.db);
    let user = users
        .upsert(&identity.uid, identity.email.as_deref())
        .await?;

    let Some(address) = users.claim_welcome(user.id).await? else {
        return Ok(Json(WelcomeResponse {
            ok: true,
            sent: false,
        }));
    };

    if let Err(e) = state.mailer.send(welcome_email(&address)).await {
        // Let a later request try again. The send failure is what the
        // caller sees either way.
        if let Err(release) = users.release_welcome(user.id).await {
            tracing::error!(user_id = user.id, error = %release, "failed to release welcome flag");
        }
        return Err(ApiError::EmailFailed {
            message: e.to_string(),
        });
    }

    tracing::info!(user_id = user.id, "welcome email sent");
    Ok(Json(WelcomeResponse {
        ok: true,
        sent: true,
    }))
}

/// Welcome routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/welcome", post(send_welcome))
}
