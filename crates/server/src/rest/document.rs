use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use shared_types::{
    actions, AppError, AppErrorKind, CaseStatus, Document, DocumentsPublic,
};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::application::get_authorized_case;
use crate::auth::extractors::AuthRequired;
use crate::db::AppState;
use crate::repo;

struct UploadParts {
    document_type: String,
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Pull `document_type` and `file` out of the multipart body.
async fn read_upload(
    mut multipart: Multipart,
    config: &crate::config::AppConfig,
) -> Result<UploadParts, AppError> {
    let max_bytes = config.max_upload_bytes;
    let mut document_type: Option<String> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid_input(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("document_type") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::invalid_input(format!("unreadable field: {e}")))?;
                document_type = Some(value);
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .unwrap_or("uploaded-document")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::invalid_input(format!("unreadable file field: {e}")))?;
                if data.len() > max_bytes {
                    return Err(AppError::invalid_input(format!(
                        "file exceeds the {max_bytes} byte upload limit"
                    )));
                }
                file = Some((filename, content_type, data.to_vec()));
            }
            _ => continue,
        }
    }

    let document_type = document_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::invalid_input("document_type is required"))?;
    if document_type.len() > 128 {
        return Err(AppError::invalid_input(
            "document_type must be at most 128 characters",
        ));
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| AppError::invalid_input("file is required"))?;
    if bytes.is_empty() {
        return Err(AppError::invalid_input("Uploaded file is empty"));
    }
    if !config.allowed_content_types.iter().any(|t| t == &content_type) {
        return Err(AppError::invalid_input(
            "Unsupported file type. Allowed: PDF, JPEG, PNG, WEBP",
        ));
    }

    Ok(UploadParts {
        document_type,
        filename,
        content_type,
        bytes,
    })
}

// ---------------------------------------------------------------------------
// POST /api/v1/applications/{id}/documents
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/documents",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 201, description = "Document stored", body = Document),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Application already decided", body = AppError),
        (status = 422, description = "Unsupported or invalid upload", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn upload_document(
    State(state): State<AppState>,
    auth: AuthRequired,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let case = get_authorized_case(&state.pool, &auth.0, id).await?;
    let status = case.case_status();
    if status.is_terminal() {
        return Err(AppError::invalid_transition(
            "Cannot upload documents to a decided application",
        ));
    }

    let upload = read_upload(multipart, crate::config::get()).await?;

    let storage_key = state
        .store
        .put(id, &upload.filename, &upload.bytes)
        .await
        .map_err(|e| {
            let err = AppError::storage("Failed to store uploaded document");
            tracing::error!(
                incident_id = err.incident_id.as_deref().unwrap_or(""),
                "document store write failed: {e}"
            );
            err
        })?;

    let document = repo::document::create(
        &state.pool,
        id,
        &upload.document_type,
        &upload.filename,
        &upload.content_type,
        upload.bytes.len() as i64,
        &storage_key,
    )
    .await?;

    repo::audit::append(
        &state.pool,
        id,
        actions::DOCUMENT_UPLOADED,
        Some(auth.0.sub),
        Some("New document uploaded"),
        json!({
            "document_type": document.document_type,
            "original_filename": document.original_filename,
            "content_type": document.content_type,
        }),
    )
    .await?;

    match status {
        CaseStatus::Draft => {
            // A concurrent first upload may have flipped the status already;
            // that race is benign.
            match repo::case::transition(
                &state.pool,
                id,
                Some(CaseStatus::Draft),
                CaseStatus::DocumentsUploaded,
            )
            .await
            {
                Ok(_) => {}
                Err(err) if err.kind == AppErrorKind::InvalidTransition => {}
                Err(err) => return Err(err),
            }
        }
        CaseStatus::MoreInfoRequired => {
            // New evidence reopens the case straight onto the queue.
            let (_, newly_queued) = repo::case::mark_queued(&state.pool, id).await?;
            if newly_queued {
                repo::audit::append(
                    &state.pool,
                    id,
                    actions::PROCESSING_QUEUED,
                    Some(auth.0.sub),
                    Some("Requeued after new evidence upload"),
                    json!({ "force_reprocess": false }),
                )
                .await?;
                state.jobs.notify_one();
            }
        }
        _ => {}
    }

    Ok((StatusCode::CREATED, Json(document)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications/{id}/documents
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/documents",
    params(("id" = Uuid, Path, description = "Application id")),
    responses(
        (status = 200, description = "Documents of the application", body = DocumentsPublic),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "documents",
    security(("bearer_auth" = []))
)]
pub async fn list_documents(
    State(pool): State<Pool<Postgres>>,
    auth: AuthRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentsPublic>, AppError> {
    get_authorized_case(&pool, &auth.0, id).await?;
    let data = repo::document::list_by_case(&pool, id).await?;
    let count = data.len() as i64;
    Ok(Json(DocumentsPublic { data, count }))
}
