use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use shared_types::{
    estimated_days_to_clear_backlog, is_overdue, priority_score, AppError, Case, QueueMetrics,
    ReviewDecisionRequest, ReviewQueueItem, ReviewQueuePublic,
};
use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

use super::ListParams;
use crate::auth::extractors::ReviewerRequired;
use crate::repo;

/// Queue entry with display-time recomputation of priority and overdue.
fn queue_item(case: &Case, now: chrono::DateTime<chrono::Utc>) -> ReviewQueueItem {
    let priority = priority_score(case.confidence_score, case.queued_at, case.sla_due_at, now);
    ReviewQueueItem {
        id: case.id,
        applicant_full_name: case.applicant_full_name.clone(),
        applicant_nationality: case.applicant_nationality.clone(),
        status: case.status.clone(),
        recommendation_summary: case.recommendation_summary.clone(),
        confidence_score: case.confidence_score,
        risk_level: case.risk_level.clone(),
        priority_score: priority,
        sla_due_at: case.sla_due_at,
        is_overdue: is_overdue(case.sla_due_at, now),
        created_at: case.created_at,
        updated_at: case.updated_at,
    }
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications/queue/review
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/applications/queue/review",
    params(ListParams),
    responses(
        (status = 200, description = "Priority-ordered pending-manual cases", body = ReviewQueuePublic),
        (status = 401, description = "Not authenticated", body = AppError),
        (status = 403, description = "Reviewer role required", body = AppError)
    ),
    tag = "review",
    security(("bearer_auth" = []))
)]
pub async fn review_queue(
    State(pool): State<Pool<Postgres>>,
    _reviewer: ReviewerRequired,
    Query(params): Query<ListParams>,
) -> Result<Json<ReviewQueuePublic>, AppError> {
    let (skip, limit) = params.normalize();
    let now = Utc::now();

    let cases = repo::queue::pending_manual(&pool).await?;
    let mut items: Vec<ReviewQueueItem> = cases.iter().map(|c| queue_item(c, now)).collect();

    // Overdue first, then highest priority, earliest deadline, oldest case.
    items.sort_by(|a, b| {
        b.is_overdue
            .cmp(&a.is_overdue)
            .then_with(|| {
                b.priority_score
                    .partial_cmp(&a.priority_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                let a_due = (a.sla_due_at.is_none(), a.sla_due_at);
                let b_due = (b.sla_due_at.is_none(), b.sla_due_at);
                a_due.cmp(&b_due)
            })
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    let count = items.len() as i64;
    let data: Vec<ReviewQueueItem> = items
        .into_iter()
        .skip(skip.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect();

    Ok(Json(ReviewQueuePublic { data, count }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications/queue/metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct MetricsParams {
    /// Overrides the configured reviewer throughput for this read.
    pub daily_manual_capacity: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/applications/queue/metrics",
    params(MetricsParams),
    responses(
        (status = 200, description = "Aggregate queue metrics", body = QueueMetrics),
        (status = 401, description = "Not authenticated", body = AppError),
        (status = 403, description = "Reviewer role required", body = AppError),
        (status = 422, description = "Invalid capacity", body = AppError)
    ),
    tag = "review",
    security(("bearer_auth" = []))
)]
pub async fn queue_metrics(
    State(pool): State<Pool<Postgres>>,
    _reviewer: ReviewerRequired,
    Query(params): Query<MetricsParams>,
) -> Result<Json<QueueMetrics>, AppError> {
    let config = crate::config::get();
    let capacity = params
        .daily_manual_capacity
        .unwrap_or(config.daily_manual_capacity);
    if capacity <= 0 {
        let mut fields = HashMap::new();
        fields.insert(
            "daily_manual_capacity".to_string(),
            "must be greater than zero".to_string(),
        );
        return Err(AppError::validation("Invalid capacity", fields));
    }

    let now = Utc::now();
    let cases = repo::queue::pending_manual(&pool).await?;

    let pending_manual_count = cases.len() as i64;
    let overdue_count = cases
        .iter()
        .filter(|c| is_overdue(c.sla_due_at, now))
        .count() as i64;
    let high_priority_count = cases
        .iter()
        .filter(|c| {
            priority_score(c.confidence_score, c.queued_at, c.sla_due_at, now)
                >= config.high_priority_threshold
        })
        .count() as i64;

    let avg_waiting_days = if cases.is_empty() {
        0.0
    } else {
        let total_days: f64 = cases
            .iter()
            .map(|c| {
                let since = c.queued_at.unwrap_or(c.created_at);
                (now - since).num_seconds().max(0) as f64 / 86_400.0
            })
            .sum();
        (total_days / cases.len() as f64 * 100.0).round() / 100.0
    };

    Ok(Json(QueueMetrics {
        pending_manual_count,
        overdue_count,
        high_priority_count,
        avg_waiting_days,
        daily_manual_capacity: capacity,
        estimated_days_to_clear_backlog: estimated_days_to_clear_backlog(
            pending_manual_count,
            capacity,
        ),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/applications/{id}/review-decision
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/review-decision",
    params(("id" = Uuid, Path, description = "Application id")),
    request_body = ReviewDecisionRequest,
    responses(
        (status = 200, description = "Decision applied", body = Case),
        (status = 401, description = "Not authenticated", body = AppError),
        (status = 403, description = "Reviewer role required", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Not awaiting review", body = AppError),
        (status = 422, description = "Invalid reason", body = AppError)
    ),
    tag = "review",
    security(("bearer_auth" = []))
)]
pub async fn submit_review_decision(
    State(pool): State<Pool<Postgres>>,
    reviewer: ReviewerRequired,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewDecisionRequest>,
) -> Result<Json<Case>, AppError> {
    let reason = body.reason.trim();
    if reason.len() < 8 || reason.len() > 1000 {
        let mut fields = HashMap::new();
        fields.insert(
            "reason".to_string(),
            "must be between 8 and 1000 characters".to_string(),
        );
        return Err(AppError::validation("Invalid reason", fields));
    }

    let case = repo::case::apply_decision(
        &pool,
        id,
        body.action.target_status(),
        reason,
        reviewer.0.sub,
    )
    .await?;

    repo::audit::append(
        &pool,
        id,
        body.action.audit_action(),
        Some(reviewer.0.sub),
        Some(reason),
        serde_json::json!({
            "decision_action": body.action,
            "final_status": case.status,
        }),
    )
    .await?;

    Ok(Json(case))
}
