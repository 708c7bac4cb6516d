use shared_types::{AppError, Case, CaseStatus};
use sqlx::{Pool, Postgres};

use super::CASE_COLUMNS;
use crate::error_convert::SqlxErrorExt;

/// Oldest queued case by `queued_at`, the FIFO head of the processing
/// queue. Mutual exclusion is settled by the case lock, not this read.
pub async fn next_queued(pool: &Pool<Postgres>) -> Result<Option<Case>, AppError> {
    let sql = format!(
        "SELECT {CASE_COLUMNS} FROM citizenship_application \
         WHERE status = $1 \
         ORDER BY queued_at ASC NULLS LAST \
         LIMIT 1"
    );
    sqlx::query_as::<_, Case>(&sql)
        .bind(CaseStatus::Queued.as_str())
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Every case awaiting manual review (ReviewReady or MoreInfoRequired).
/// Ordering and priority recomputation happen in the caller, which knows
/// the current clock.
pub async fn pending_manual(pool: &Pool<Postgres>) -> Result<Vec<Case>, AppError> {
    let sql = format!(
        "SELECT {CASE_COLUMNS} FROM citizenship_application \
         WHERE status = $1 OR status = $2"
    );
    sqlx::query_as::<_, Case>(&sql)
        .bind(CaseStatus::ReviewReady.as_str())
        .bind(CaseStatus::MoreInfoRequired.as_str())
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}
