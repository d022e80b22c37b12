//! Subject and breadth lists for the search filters

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::db::repos::CatalogRepo;
use crate::http::error::ApiError;
use crate::http::server::AppState;

/// GET /api/subjects
async fn list_subjects(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    let subjects = CatalogRepo::new(&state.db)
        .subjects(state.settings.term)
        .await?;
    Ok(Json(subjects))
}

/// GET /api/breadths
async fn list_breadths(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    let breadths = CatalogRepo::new(&state.db).breadths().await?;
    Ok(Json(breadths))
}

/// Catalog routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/subjects", get(list_subjects))
        .route("/api/breadths", get(list_breadths))
}
