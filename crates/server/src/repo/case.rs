use chrono::Utc;
use shared_types::{AppError, Case, CaseStatus, CreateCaseRequest, UpdateCaseRequest};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::CASE_COLUMNS;
use crate::error_convert::SqlxErrorExt;

/// Insert a new case in Draft.
pub async fn create(
    pool: &Pool<Postgres>,
    owner_id: Uuid,
    req: &CreateCaseRequest,
) -> Result<Case, AppError> {
    let sql = format!(
        "INSERT INTO citizenship_application \
             (id, owner_id, applicant_full_name, applicant_nationality, \
              applicant_birth_date, notes, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {CASE_COLUMNS}"
    );
    sqlx::query_as::<_, Case>(&sql)
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&req.applicant_full_name)
        .bind(&req.applicant_nationality)
        .bind(req.applicant_birth_date)
        .bind(&req.notes)
        .bind(CaseStatus::Draft.as_str())
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<Case>, AppError> {
    let sql = format!("SELECT {CASE_COLUMNS} FROM citizenship_application WHERE id = $1");
    sqlx::query_as::<_, Case>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Patch applicant-supplied fields. Derived fields (status, scores, SLA,
/// decision) are not reachable from this statement.
pub async fn update_fields(
    pool: &Pool<Postgres>,
    id: Uuid,
    patch: &UpdateCaseRequest,
) -> Result<Option<Case>, AppError> {
    let sql = format!(
        "UPDATE citizenship_application SET \
             applicant_full_name   = COALESCE($2, applicant_full_name), \
             applicant_nationality = COALESCE($3, applicant_nationality), \
             applicant_birth_date  = COALESCE($4, applicant_birth_date), \
             notes                 = COALESCE($5, notes), \
             updated_at            = NOW() \
         WHERE id = $1 \
         RETURNING {CASE_COLUMNS}"
    );
    sqlx::query_as::<_, Case>(&sql)
        .bind(id)
        .bind(patch.applicant_full_name.as_deref())
        .bind(patch.applicant_nationality.as_deref())
        .bind(patch.applicant_birth_date)
        .bind(patch.notes.as_deref())
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// List cases, owner-scoped unless `owner` is None (reviewer view).
/// Returns (cases, total_count), newest first.
pub async fn list(
    pool: &Pool<Postgres>,
    owner: Option<Uuid>,
    skip: i64,
    limit: i64,
) -> Result<(Vec<Case>, i64), AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM citizenship_application \
         WHERE ($1::UUID IS NULL OR owner_id = $1)",
    )
    .bind(owner)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let sql = format!(
        "SELECT {CASE_COLUMNS} FROM citizenship_application \
         WHERE ($1::UUID IS NULL OR owner_id = $1) \
         ORDER BY created_at DESC \
         LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, Case>(&sql)
        .bind(owner)
        .bind(limit)
        .bind(skip)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok((rows, total))
}

/// Apply a status transition under a row lock, enforcing the status graph.
///
/// When `expected_from` is set, the transition also fails if the case has
/// concurrently moved away from that status.
pub async fn transition(
    pool: &Pool<Postgres>,
    id: Uuid,
    expected_from: Option<CaseStatus>,
    to: CaseStatus,
) -> Result<Case, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM citizenship_application WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;

    let Some(current) = current else {
        return Err(AppError::not_found("Application not found"));
    };
    let from = CaseStatus::parse(&current)
        .ok_or_else(|| AppError::internal(format!("unknown stored status: {current}")))?;

    if let Some(expected) = expected_from {
        if from != expected {
            return Err(AppError::invalid_transition(format!(
                "application is {from}, expected {expected}"
            )));
        }
    }
    if !from.can_transition(to) {
        return Err(AppError::invalid_transition(format!(
            "cannot transition from {from} to {to}"
        )));
    }

    let sql = format!(
        "UPDATE citizenship_application \
         SET status = $2, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {CASE_COLUMNS}"
    );
    let case = sqlx::query_as::<_, Case>(&sql)
        .bind(id)
        .bind(to.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(case)
}

/// Move a case to Queued, stamping `queued_at`. Idempotent: an already
/// queued case is returned unchanged without touching `queued_at`.
pub async fn mark_queued(pool: &Pool<Postgres>, id: Uuid) -> Result<(Case, bool), AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM citizenship_application WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;

    let Some(current) = current else {
        return Err(AppError::not_found("Application not found"));
    };
    let from = CaseStatus::parse(&current)
        .ok_or_else(|| AppError::internal(format!("unknown stored status: {current}")))?;

    if from == CaseStatus::Queued {
        let sql = format!("SELECT {CASE_COLUMNS} FROM citizenship_application WHERE id = $1");
        let case = sqlx::query_as::<_, Case>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;
        tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
        return Ok((case, false));
    }

    if !from.can_transition(CaseStatus::Queued) {
        return Err(AppError::invalid_transition(format!(
            "cannot queue an application in status {from}"
        )));
    }

    let sql = format!(
        "UPDATE citizenship_application \
         SET status = $2, queued_at = $3, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {CASE_COLUMNS}"
    );
    let case = sqlx::query_as::<_, Case>(&sql)
        .bind(id)
        .bind(CaseStatus::Queued.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok((case, true))
}

/// Finalize a review decision: status, final_decision fields, SLA and
/// priority bookkeeping, all in one statement after a graph-checked
/// transition.
pub async fn apply_decision(
    pool: &Pool<Postgres>,
    id: Uuid,
    to: CaseStatus,
    reason: &str,
    reviewer_id: Uuid,
) -> Result<Case, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM citizenship_application WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;

    let Some(current) = current else {
        return Err(AppError::not_found("Application not found"));
    };
    let from = CaseStatus::parse(&current)
        .ok_or_else(|| AppError::internal(format!("unknown stored status: {current}")))?;

    if !from.is_pending_manual() {
        return Err(AppError::invalid_transition(format!(
            "review decisions require a pending-manual application, found {from}"
        )));
    }
    if !from.can_transition(to) {
        return Err(AppError::invalid_transition(format!(
            "cannot transition from {from} to {to}"
        )));
    }

    // Terminal decisions zero the priority; more-info keeps the case in
    // the queue. `sla_due_at` is cleared in every decision outcome.
    let clear_priority = to.is_terminal();
    let sql = format!(
        "UPDATE citizenship_application SET \
             status = $2, \
             final_decision = $2, \
             final_decision_reason = $3, \
             final_decision_by_id = $4, \
             final_decision_at = NOW(), \
             sla_due_at = NULL, \
             priority_score = CASE WHEN $5 THEN 0 ELSE priority_score END, \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {CASE_COLUMNS}"
    );
    let case = sqlx::query_as::<_, Case>(&sql)
        .bind(id)
        .bind(to.as_str())
        .bind(reason)
        .bind(reviewer_id)
        .bind(clear_priority)
        .fetch_one(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(case)
}
