use chrono::{DateTime, Duration, Utc};
use shared_types::AppError;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

/// A stale lock row found during reclamation.
#[derive(Debug, Clone)]
pub struct StaleLock {
    pub case_id: Uuid,
    pub holder_id: Uuid,
    pub acquired_at: DateTime<Utc>,
}

/// Try to take the per-case processing lock. Non-blocking: returns false
/// immediately when another holder owns the case.
pub async fn acquire(
    pool: &Pool<Postgres>,
    case_id: Uuid,
    holder_id: Uuid,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "INSERT INTO case_lock (case_id, holder_id, acquired_at) \
         VALUES ($1, $2, NOW()) \
         ON CONFLICT (case_id) DO NOTHING",
    )
    .bind(case_id)
    .bind(holder_id)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected() > 0)
}

/// Release a lock held by this holder. Releasing a lock we no longer hold
/// is a no-op.
pub async fn release(
    pool: &Pool<Postgres>,
    case_id: Uuid,
    holder_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM case_lock WHERE case_id = $1 AND holder_id = $2")
        .bind(case_id)
        .bind(holder_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

pub async fn is_locked(pool: &Pool<Postgres>, case_id: Uuid) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM case_lock WHERE case_id = $1")
        .bind(case_id)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(count > 0)
}

/// Locks older than the stale TTL: crashed workers that never released.
pub async fn find_stale(
    pool: &Pool<Postgres>,
    ttl_seconds: i64,
) -> Result<Vec<StaleLock>, AppError> {
    let cutoff = Utc::now() - Duration::seconds(ttl_seconds);
    let rows: Vec<(Uuid, Uuid, DateTime<Utc>)> = sqlx::query_as(
        "SELECT case_id, holder_id, acquired_at FROM case_lock WHERE acquired_at < $1",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(rows
        .into_iter()
        .map(|(case_id, holder_id, acquired_at)| StaleLock {
            case_id,
            holder_id,
            acquired_at,
        })
        .collect())
}

/// Remove a specific stale lock row. Guarded by holder so a revived
/// worker's fresh lock is never deleted by the reclaimer.
pub async fn remove(
    pool: &Pool<Postgres>,
    case_id: Uuid,
    holder_id: Uuid,
) -> Result<(), AppError> {
    release(pool, case_id, holder_id).await
}
