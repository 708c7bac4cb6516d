use serde_json::Value;
use shared_types::{AppError, Document, DocumentStatus};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const DOCUMENT_COLUMNS: &str = "id, application_id, document_type, original_filename, \
     content_type, file_size_bytes, storage_key, status, extracted_text, \
     extracted_fields, processing_error, created_at, updated_at";

/// Insert a freshly uploaded document.
pub async fn create(
    pool: &Pool<Postgres>,
    application_id: Uuid,
    document_type: &str,
    original_filename: &str,
    content_type: &str,
    file_size_bytes: i64,
    storage_key: &str,
) -> Result<Document, AppError> {
    let sql = format!(
        "INSERT INTO application_document \
             (id, application_id, document_type, original_filename, \
              content_type, file_size_bytes, storage_key, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {DOCUMENT_COLUMNS}"
    );
    sqlx::query_as::<_, Document>(&sql)
        .bind(Uuid::new_v4())
        .bind(application_id)
        .bind(document_type)
        .bind(original_filename)
        .bind(content_type)
        .bind(file_size_bytes)
        .bind(storage_key)
        .bind(DocumentStatus::Uploaded.as_str())
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// All documents of a case, newest first.
pub async fn list_by_case(
    pool: &Pool<Postgres>,
    application_id: Uuid,
) -> Result<Vec<Document>, AppError> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM application_document \
         WHERE application_id = $1 \
         ORDER BY created_at DESC"
    );
    sqlx::query_as::<_, Document>(&sql)
        .bind(application_id)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn count_by_case(pool: &Pool<Postgres>, application_id: Uuid) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM application_document WHERE application_id = $1")
        .bind(application_id)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Update processing state; `processing_error` is cleared unless provided.
pub async fn set_status(
    pool: &Pool<Postgres>,
    id: Uuid,
    status: DocumentStatus,
    processing_error: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE application_document \
         SET status = $2, processing_error = $3, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(processing_error)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

/// Persist extraction output and mark the document Processed.
pub async fn store_extraction(
    pool: &Pool<Postgres>,
    id: Uuid,
    extracted_text: &str,
    extracted_fields: &Value,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE application_document SET \
             status = $2, \
             extracted_text = $3, \
             extracted_fields = $4, \
             processing_error = NULL, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(DocumentStatus::Processed.as_str())
    .bind(extracted_text)
    .bind(extracted_fields)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

/// Reset every document of a case for a forced reprocess: back to
/// Uploaded with extraction output cleared.
pub async fn reset_for_reprocess(
    pool: &Pool<Postgres>,
    application_id: Uuid,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE application_document SET \
             status = $2, \
             extracted_text = NULL, \
             extracted_fields = '{}', \
             processing_error = NULL, \
             updated_at = NOW() \
         WHERE application_id = $1",
    )
    .bind(application_id)
    .bind(DocumentStatus::Uploaded.as_str())
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected())
}
