use serde_json::Value;
use shared_types::{AppError, AuditEvent};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const AUDIT_COLUMNS: &str =
    "id, application_id, actor_user_id, action, reason, metadata, created_at";

/// Append one audit event. There is no update or delete path; the trail
/// is append-only by construction.
pub async fn append(
    pool: &Pool<Postgres>,
    application_id: Uuid,
    action: &str,
    actor_user_id: Option<Uuid>,
    reason: Option<&str>,
    metadata: Value,
) -> Result<AuditEvent, AppError> {
    let sql = format!(
        "INSERT INTO application_audit_event \
             (id, application_id, actor_user_id, action, reason, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {AUDIT_COLUMNS}"
    );
    sqlx::query_as::<_, AuditEvent>(&sql)
        .bind(Uuid::new_v4())
        .bind(application_id)
        .bind(actor_user_id)
        .bind(action)
        .bind(reason)
        .bind(metadata)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Chronological audit trail of a case.
pub async fn list_by_case(
    pool: &Pool<Postgres>,
    application_id: Uuid,
) -> Result<Vec<AuditEvent>, AppError> {
    let sql = format!(
        "SELECT {AUDIT_COLUMNS} FROM application_audit_event \
         WHERE application_id = $1 \
         ORDER BY created_at ASC, id ASC"
    );
    sqlx::query_as::<_, AuditEvent>(&sql)
        .bind(application_id)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}
