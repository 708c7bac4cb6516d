use axum::{
    extract::{Path, State},
    Json,
};
use shared_types::{AppError, CaseExplanation, EvidenceRecommendations};
use uuid::Uuid;

use super::application::get_authorized_case;
use crate::advisory;
use crate::auth::extractors::AuthRequired;
use crate::db::AppState;

// ---------------------------------------------------------------------------
// GET /api/v1/applications/{id}/case-explainer
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/case-explainer",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, description = "Advisory memo", body = CaseExplanation),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "advisory",
    security(("bearer_auth" = []))
)]
pub async fn case_explainer(
    State(state): State<AppState>,
    auth: AuthRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<CaseExplanation>, AppError> {
    let case = get_authorized_case(&state.pool, &auth.0, id).await?;
    let explanation =
        advisory::case_explainer(&state.pool, state.advisory.as_ref(), &case, auth.0.sub).await?;
    Ok(Json(explanation))
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications/{id}/evidence-recommendations
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/evidence-recommendations",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, description = "Advisory evidence gaps", body = EvidenceRecommendations),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "advisory",
    security(("bearer_auth" = []))
)]
pub async fn evidence_recommendations(
    State(state): State<AppState>,
    auth: AuthRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<EvidenceRecommendations>, AppError> {
    let case = get_authorized_case(&state.pool, &auth.0, id).await?;
    let recommendations = advisory::evidence_recommendations(&state.pool, &case).await?;
    Ok(Json(recommendations))
}
