use shared_types::{AppError, User};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, is_active, is_reviewer, created_at";

/// Insert a new user. Email is stored lowercased; uniqueness violations
/// surface as Conflict.
pub async fn create(
    pool: &Pool<Postgres>,
    email: &str,
    password_hash: &str,
    full_name: Option<&str>,
) -> Result<User, AppError> {
    let sql = format!(
        "INSERT INTO users (id, email, password_hash, full_name) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {USER_COLUMNS}"
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(Uuid::new_v4())
        .bind(email.trim().to_lowercase())
        .bind(password_hash)
        .bind(full_name)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<User>, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Update the caller's own profile fields. Returns the updated row or None.
pub async fn update_me(
    pool: &Pool<Postgres>,
    id: Uuid,
    email: Option<&str>,
    full_name: Option<&str>,
) -> Result<Option<User>, AppError> {
    let sql = format!(
        "UPDATE users SET \
             email = COALESCE($2, email), \
             full_name = COALESCE($3, full_name) \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .bind(email.map(|e| e.trim().to_lowercase()))
        .bind(full_name)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}
