//! Alert endpoints - save, remove and list the caller's seat alerts

use std::sync::Arc;

use axum::{
    extract::State,
    handler::Handler,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::repos::{AlertRepo, SaveOutcome, SavedCourse, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::AuthUser;
use crate::http::rate_limit::{rate_limit, RateLimiter};
use crate::http::server::AppState;
use crate::models::{AlertRule, SectionSelection, ValidationError};

/// Create alerts request
#[derive(Debug, Deserialize)]
pub struct CreateAlertsRequest {
    #[serde(alias = "courseId")]
    pub course_id: String,
    #[serde(alias = "sectionNum", alias = "sectionNums")]
    pub section_nums: Vec<String>,
    #[serde(alias = "alertType")]
    pub alert_type: String,
    #[serde(default, alias = "seatThreshold")]
    pub seat_threshold: Option<i32>,
}

/// Delete alerts request
#[derive(Debug, Deserialize)]
pub struct DeleteAlertsRequest {
    #[serde(alias = "courseId")]
    pub course_id: String,
    #[serde(alias = "sectionNum", alias = "sectionNums")]
    pub section_nums: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveAlertsResponse {
    pub ok: bool,
    pub created: usize,
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteAlertsResponse {
    pub ok: bool,
    pub deleted: u64,
}

/// POST /api/notifications - save an alert rule for one or more sections
async fn create_alerts(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(req): Json<CreateAlertsRequest>,
) -> Result<(StatusCode, Json<SaveAlertsResponse>), ApiError> {
    let rule = AlertRule::new(&req.alert_type, req.seat_threshold)?;
    let selection = SectionSelection::new(&req.course_id, &req.section_nums)?;

    let user = UserRepo::new(&state.db)
        .upsert(&identity.uid, identity.email.as_deref())
        .await?;

    let outcome = AlertRepo::new(&state.db)
        .save(
            user.id,
            &selection,
            rule,
            state.settings.term,
            state.settings.max_saved_alerts,
        )
        .await?;

    match outcome {
        SaveOutcome::Saved { created, updated } => {
            tracing::info!(
                user_id = user.id,
                course_id = selection.course_id.as_str(),
                created,
                updated,
                "alerts saved"
            );
            Ok((
                StatusCode::CREATED,
                Json(SaveAlertsResponse {
                    ok: true,
                    created,
                    updated,
                }),
            ))
        }
        SaveOutcome::Duplicate => Err(ApiError::Conflict {
            message: "alert already exists".into(),
        }),
        SaveOutcome::LimitExceeded { limit, current } => {
            Err(ApiError::AlertLimit { limit, current })
        }
        SaveOutcome::UnknownSections(sections) => {
            Err(ApiError::Validation(ValidationError::UnknownSections {
                course_id: selection.course_id.as_str().to_owned(),
                sections,
            }))
        }
    }
}

/// DELETE /api/notifications - remove alerts for the given sections
async fn delete_alerts(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(req): Json<DeleteAlertsRequest>,
) -> Result<Json<DeleteAlertsResponse>, ApiError> {
    let selection = SectionSelection::new(&req.course_id, &req.section_nums)?;

    let user = UserRepo::new(&state.db)
        .upsert(&identity.uid, identity.email.as_deref())
        .await?;

    let deleted = AlertRepo::new(&state.db).delete(user.id, &selection).await?;
    tracing::info!(user_id = user.id, deleted, "alerts deleted");

    Ok(Json(DeleteAlertsResponse { ok: true, deleted }))
}

/// GET /api/my-courses - the caller's alerts with live seat counts
async fn my_courses(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<SavedCourse>>, ApiError> {
    let user = UserRepo::new(&state.db)
        .upsert(&identity.uid, identity.email.as_deref())
        .await?;

    let courses = AlertRepo::new(&state.db)
        .list_for_user(user.id, state.settings.term)
        .await?;

    Ok(Json(courses))
}

/// Alert routes. Only DELETE is rate limited.
pub fn router(limiter: Arc<RateLimiter>) -> Router<Arc<AppState>> {
    let limited_delete = delete_alerts.layer(middleware::from_fn_with_state(limiter, rate_limit));

    Router::new()
        .route(
            "/api/notifications",
            post(create_alerts).delete(limited_delete),
        )
        .route("/api/my-courses", get(my_courses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{self, TEST_TOKEN};

    fn request(method: Method, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri("/api/notifications")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "10.2.2.2");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn error_code(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["error"].as_str().unwrap_or_default().to_owned()
    }

    #[test]
    fn request_accepts_camel_case() {
        let req: CreateAlertsRequest = serde_json::from_value(json!({
            "courseId": "024798",
            "sectionNum": ["001", "301"],
            "alertType": "threshold",
            "seatThreshold": 2
        }))
        .unwrap();
        assert_eq!(req.course_id, "024798");
        assert_eq!(req.section_nums, vec!["001", "301"]);
        assert_eq!(req.seat_threshold, Some(2));
    }

    #[tokio::test]
    async fn missing_token_is_401() {
        let body = json!({"course_id": "024798", "section_nums": ["001"], "alert_type": "any"});
        let response = test_support::router()
            .oneshot(request(Method::POST, None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "unauthorized");
    }

    #[tokio::test]
    async fn unknown_token_is_401() {
        let body = json!({"course_id": "024798", "section_nums": ["001"], "alert_type": "any"});
        let response = test_support::router()
            .oneshot(request(Method::POST, Some("forged"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn threshold_without_count_is_400() {
        let body = json!({"course_id": "024798", "section_nums": ["001"], "alert_type": "threshold"});
        let response = test_support::router()
            .oneshot(request(Method::POST, Some(TEST_TOKEN), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "validation_error");
    }

    #[tokio::test]
    async fn empty_sections_is_400() {
        let body = json!({"course_id": "024798", "section_nums": [], "alert_type": "any"});
        let response = test_support::router()
            .oneshot(request(Method::POST, Some(TEST_TOKEN), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_validates_course_id() {
        let body = json!({"course_id": "", "section_nums": ["001"]});
        let response = test_support::router()
            .oneshot(request(Method::DELETE, Some(TEST_TOKEN), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn only_delete_is_rate_limited() {
        let app = test_support::router();
        let bad = json!({"course_id": "", "section_nums": ["001"], "alert_type": "any"});

        for _ in 0..40 {
            let response = app
                .clone()
                .oneshot(request(Method::DELETE, Some(TEST_TOKEN), bad.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, Some(TEST_TOKEN), bad.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = app
            .oneshot(request(Method::POST, Some(TEST_TOKEN), bad))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
