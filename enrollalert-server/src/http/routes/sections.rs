//! Section endpoints for a single course (rate limited)

use std::sync::Arc;

use axum::{extract::State, middleware, routing::get, Json, Router};

use crate::db::repos::{CourseRepo, DiscussionSection, Lecture};
use crate::http::error::ApiError;
use crate::http::extractors::ValidCourseId;
use crate::http::rate_limit::{rate_limit, RateLimiter};
use crate::http::server::AppState;

/// GET /api/sections/{course_id} - lectures with their subsections
async fn course_sections(
    State(state): State<Arc<AppState>>,
    ValidCourseId(course_id): ValidCourseId,
) -> Result<Json<Vec<Lecture>>, ApiError> {
    let lectures = CourseRepo::new(&state.db)
        .subsections(&course_id, state.settings.term)
        .await?;
    Ok(Json(lectures))
}

/// GET /api/discussions/{course_id} - flat non-lecture sections
async fn course_discussions(
    State(state): State<Arc<AppState>>,
    ValidCourseId(course_id): ValidCourseId,
) -> Result<Json<Vec<DiscussionSection>>, ApiError> {
    let sections = CourseRepo::new(&state.db)
        .discussions(&course_id, state.settings.term)
        .await?;
    Ok(Json(sections))
}

/// Section routes
pub fn router(limiter: Arc<RateLimiter>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sections/{course_id}", get(course_sections))
        .route("/api/discussions/{course_id}", get(course_discussions))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit))
}
