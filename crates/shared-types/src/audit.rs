use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Stable machine keys for audit actions.
pub mod actions {
    pub const CASE_CREATED: &str = "case_created";
    pub const CASE_UPDATED: &str = "case_updated";
    pub const DOCUMENT_UPLOADED: &str = "document_uploaded";
    pub const PROCESSING_QUEUED: &str = "processing_queued";
    pub const PROCESSING_STARTED: &str = "processing_started";
    pub const PROCESSING_COMPLETED: &str = "processing_completed";
    pub const PROCESSING_FAILED: &str = "processing_failed";
    pub const PROCESSING_RECOVERED: &str = "processing_recovered";
    pub const PROCESSING_CANCELLED: &str = "processing_cancelled";
    pub const REVIEW_APPROVED: &str = "review_approved";
    pub const REVIEW_REJECTED: &str = "review_rejected";
    pub const MORE_INFO_REQUESTED: &str = "more_info_requested";
    pub const ADVISORY_FALLBACK: &str = "advisory_fallback";
}

/// One append-only audit trail entry for a case. Events are never mutated
/// or deleted; the trail is totally ordered by append within a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct AuditEvent {
    pub id: Uuid,
    pub application_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub action: String,
    pub reason: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Chronological audit trail response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditTrailPublic {
    pub application_id: Uuid,
    pub events: Vec<AuditEvent>,
}
