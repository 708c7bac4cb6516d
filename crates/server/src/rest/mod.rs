pub mod advisory;
pub mod application;
pub mod auth;
pub mod document;
pub mod review;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::db::AppState;

/// Pagination query params shared by list endpoints.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ListParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListParams {
    /// Normalized (skip, limit) with safe bounds.
    pub fn normalize(&self) -> (i64, i64) {
        let skip = self.skip.unwrap_or(0).max(0);
        let limit = self.limit.unwrap_or(100).clamp(1, 100);
        (skip, limit)
    }
}

/// Build the versioned REST API router.
pub fn api_router() -> Router<AppState> {
    let max_upload = crate::config::get().max_upload_bytes;

    Router::new()
        // Auth + users
        .route("/api/v1/login", post(auth::login))
        .route("/api/v1/users/signup", post(auth::signup))
        .route("/api/v1/users/me", get(auth::me).patch(auth::update_me))
        // Review queue (static segments before {id} routes)
        .route("/api/v1/applications/queue/review", get(review::review_queue))
        .route("/api/v1/applications/queue/metrics", get(review::queue_metrics))
        // Applications
        .route(
            "/api/v1/applications",
            get(application::list_applications).post(application::create_application),
        )
        .route("/api/v1/applications/{id}", get(application::get_application).patch(application::update_application))
        .route(
            "/api/v1/applications/{id}/documents",
            get(document::list_documents).post(document::upload_document),
        )
        .route("/api/v1/applications/{id}/process", post(application::process_application))
        .route(
            "/api/v1/applications/{id}/decision-breakdown",
            get(application::decision_breakdown),
        )
        .route("/api/v1/applications/{id}/audit-trail", get(application::audit_trail))
        .route("/api/v1/applications/{id}/review-decision", post(review::submit_review_decision))
        .route("/api/v1/applications/{id}/case-explainer", get(advisory::case_explainer))
        .route(
            "/api/v1/applications/{id}/evidence-recommendations",
            get(advisory::evidence_recommendations),
        )
        // Multipart uploads may exceed axum's default 2 MB body cap.
        .layer(DefaultBodyLimit::max(max_upload + 64 * 1024))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_normalize_bounds() {
        let params = ListParams {
            skip: Some(-5),
            limit: Some(1000),
        };
        assert_eq!(params.normalize(), (0, 100));
        assert_eq!(ListParams::default().normalize(), (0, 100));
        let params = ListParams {
            skip: Some(10),
            limit: Some(0),
        };
        assert_eq!(params.normalize(), (10, 1));
    }
}
