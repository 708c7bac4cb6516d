use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use shared_types::{
    actions, AppError, AuditTrailPublic, Case, CasesPublic, CreateCaseRequest, DecisionBreakdown,
    ProcessRequest, RiskLevel, UpdateCaseRequest,
};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::ListParams;
use crate::auth::extractors::AuthRequired;
use crate::auth::jwt::Claims;
use crate::db::AppState;
use crate::error_convert::ValidateRequest;
use crate::{pipeline, repo};

/// Load a case the caller may see: its owner, or any reviewer.
/// Foreign cases read as 404 so their existence is not leaked.
pub(crate) async fn get_authorized_case(
    pool: &Pool<Postgres>,
    claims: &Claims,
    case_id: Uuid,
) -> Result<Case, AppError> {
    let case = repo::case::find_by_id(pool, case_id)
        .await?
        .ok_or_else(|| AppError::not_found("Application not found"))?;
    if !claims.is_reviewer && case.owner_id != claims.sub {
        return Err(AppError::not_found("Application not found"));
    }
    Ok(case)
}

// ---------------------------------------------------------------------------
// POST /api/v1/applications
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/applications",
    request_body = CreateCaseRequest,
    responses(
        (status = 201, description = "Application created", body = Case),
        (status = 401, description = "Not authenticated", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "applications",
    security(("bearer_auth" = []))
)]
pub async fn create_application(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    Json(body): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<Case>), AppError> {
    body.validate_request()?;

    let case = repo::case::create(&pool, auth.0.sub, &body).await?;
    repo::audit::append(
        &pool,
        case.id,
        actions::CASE_CREATED,
        Some(auth.0.sub),
        Some("Application created by applicant"),
        json!({
            "applicant_full_name": case.applicant_full_name,
            "applicant_nationality": case.applicant_nationality,
        }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(case)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/applications",
    params(ListParams),
    responses(
        (status = 200, description = "Applications visible to the caller", body = CasesPublic),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "applications",
    security(("bearer_auth" = []))
)]
pub async fn list_applications(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    Query(params): Query<ListParams>,
) -> Result<Json<CasesPublic>, AppError> {
    let (skip, limit) = params.normalize();
    let owner = if auth.0.is_reviewer {
        None
    } else {
        Some(auth.0.sub)
    };
    let (data, count) = repo::case::list(&pool, owner, skip, limit).await?;
    Ok(Json(CasesPublic { data, count }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, description = "Application", body = Case),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "applications",
    security(("bearer_auth" = []))
)]
pub async fn get_application(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<Case>, AppError> {
    let case = get_authorized_case(&pool, &auth.0, id).await?;
    Ok(Json(case))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/applications/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    patch,
    path = "/api/v1/applications/{id}",
    params(("id" = Uuid, Path, description = "Application id")),
    request_body = UpdateCaseRequest,
    responses(
        (status = 200, description = "Updated application", body = Case),
        (status = 404, description = "Not found", body = AppError),
        (status = 422, description = "Validation error", body = AppError)
    ),
    tag = "applications",
    security(("bearer_auth" = []))
)]
pub async fn update_application(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCaseRequest>,
) -> Result<Json<Case>, AppError> {
    body.validate_request()?;
    let case = get_authorized_case(&pool, &auth.0, id).await?;

    if body.is_empty() {
        return Ok(Json(case));
    }

    let updated = repo::case::update_fields(&pool, id, &body)
        .await?
        .ok_or_else(|| AppError::not_found("Application not found"))?;

    let mut changed: Vec<&str> = Vec::new();
    if body.applicant_full_name.is_some() {
        changed.push("applicant_full_name");
    }
    if body.applicant_nationality.is_some() {
        changed.push("applicant_nationality");
    }
    if body.applicant_birth_date.is_some() {
        changed.push("applicant_birth_date");
    }
    if body.notes.is_some() {
        changed.push("notes");
    }
    repo::audit::append(
        &pool,
        id,
        actions::CASE_UPDATED,
        Some(auth.0.sub),
        None,
        json!({ "changed_fields": changed }),
    )
    .await?;

    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// POST /api/v1/applications/{id}/process
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/process",
    params(("id" = Uuid, Path, description = "Application id")),
    request_body = ProcessRequest,
    responses(
        (status = 200, description = "Application queued", body = Case),
        (status = 400, description = "No documents uploaded", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Already processing", body = AppError)
    ),
    tag = "applications",
    security(("bearer_auth" = []))
)]
pub async fn process_application(
    State(state): State<AppState>,
    auth: AuthRequired,
    Path(id): Path<Uuid>,
    Json(body): Json<ProcessRequest>,
) -> Result<Json<Case>, AppError> {
    get_authorized_case(&state.pool, &auth.0, id).await?;

    let case =
        pipeline::queue_processing(&state.pool, id, auth.0.sub, body.force_reprocess).await?;
    state.jobs.notify_one();

    Ok(Json(case))
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications/{id}/decision-breakdown
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/decision-breakdown",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, description = "Rule results and derived scores", body = DecisionBreakdown),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "applications",
    security(("bearer_auth" = []))
)]
pub async fn decision_breakdown(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<DecisionBreakdown>, AppError> {
    let case = get_authorized_case(&pool, &auth.0, id).await?;
    let rules = repo::rule_result::list_by_case(&pool, id).await?;

    let confidence_score = case.confidence_score.unwrap_or(0.0);
    let risk_level = case
        .risk_level
        .clone()
        .unwrap_or_else(|| RiskLevel::from_confidence(confidence_score).as_str().to_string());

    Ok(Json(DecisionBreakdown {
        application_id: case.id,
        recommendation: case
            .recommendation_summary
            .unwrap_or_else(|| "Processing not completed yet for this application".to_string()),
        confidence_score,
        risk_level,
        rules,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications/{id}/audit-trail
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/audit-trail",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, description = "Chronological audit events", body = AuditTrailPublic),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "applications",
    security(("bearer_auth" = []))
)]
pub async fn audit_trail(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditTrailPublic>, AppError> {
    let case = get_authorized_case(&pool, &auth.0, id).await?;
    let events = repo::audit::list_by_case(&pool, id).await?;
    Ok(Json(AuditTrailPublic {
        application_id: case.id,
        events,
    }))
}
