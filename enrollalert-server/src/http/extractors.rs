//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::error::ApiError;
use super::server::AppState;
use crate::auth::{bearer_token, AuthError, Identity};
use crate::models::{CourseId, ValidationError};

/// Caller verified from the `Authorization: Bearer` header
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthError::MissingToken)?;

        let identity = state.verifier.verify(token).await?;
        Ok(Self(identity))
    }
}

/// Extract and validate a course id from path
pub struct ValidCourseId(pub CourseId);

impl<S> FromRequestParts<S> for ValidCourseId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "course id" }))?;

        let course_id = CourseId::new(&id)?;
        Ok(Self(course_id))
    }
}
