//! Course search endpoint

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::repos::{CourseRepo, CourseSummary};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{CourseFilters, Paginated, Pagination};

/// Query string for GET /api/courses
#[derive(Debug, Default, Deserialize)]
pub struct CourseQuery {
    pub search: Option<String>,
    pub subject: Option<String>,
    /// Comma-separated breadth names
    pub breadths: Option<String>,
    #[serde(default, alias = "openOnly")]
    pub open_only: bool,
    pub page: Option<u32>,
    #[serde(alias = "perPage")]
    pub per_page: Option<u32>,
}

/// GET /api/courses - filtered, paginated course list
async fn list_courses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CourseQuery>,
) -> Result<Json<Paginated<CourseSummary>>, ApiError> {
    let filters = CourseFilters::parse(
        query.search.as_deref(),
        query.subject.as_deref(),
        query.breadths.as_deref(),
        query.open_only,
    )?;
    let page = Pagination::from_query(query.page, query.per_page);

    let courses = CourseRepo::new(&state.db)
        .search(&filters, state.settings.term, page)
        .await?;

    Ok(Json(courses))
}

/// Course routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/courses", get(list_courses))
}
