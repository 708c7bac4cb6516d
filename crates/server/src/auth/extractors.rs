use axum::{extract::FromRequestParts, http::request::Parts};
use shared_types::AppError;

use super::jwt::Claims;

/// Extractor that requires authentication. Returns 401 if no valid token.
pub struct AuthRequired(pub Claims);

impl<S: Send + Sync> FromRequestParts<S> for AuthRequired {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthRequired)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// Extractor that requires authentication AND the reviewer role.
/// Returns 401 if unauthenticated, 403 for non-reviewers.
pub struct ReviewerRequired(pub Claims);

impl<S: Send + Sync> FromRequestParts<S> for ReviewerRequired {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

        if !claims.is_reviewer {
            return Err(AppError::forbidden("Reviewer role required"));
        }

        Ok(ReviewerRequired(claims))
    }
}
