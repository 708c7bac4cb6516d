use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ── Status state machine ────────────────────────────────────────────

/// Lifecycle status of a citizenship application.
///
/// Transitions are monotonic along the graph in [`CaseStatus::can_transition`];
/// the only backwards edges are the processing-failure rollback and the
/// reopen path out of `MoreInfoRequired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Draft,
    DocumentsUploaded,
    Queued,
    Processing,
    ReviewReady,
    Approved,
    Rejected,
    MoreInfoRequired,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Draft => "draft",
            CaseStatus::DocumentsUploaded => "documents_uploaded",
            CaseStatus::Queued => "queued",
            CaseStatus::Processing => "processing",
            CaseStatus::ReviewReady => "review_ready",
            CaseStatus::Approved => "approved",
            CaseStatus::Rejected => "rejected",
            CaseStatus::MoreInfoRequired => "more_info_required",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CaseStatus::Draft),
            "documents_uploaded" => Some(CaseStatus::DocumentsUploaded),
            "queued" => Some(CaseStatus::Queued),
            "processing" => Some(CaseStatus::Processing),
            "review_ready" => Some(CaseStatus::ReviewReady),
            "approved" => Some(CaseStatus::Approved),
            "rejected" => Some(CaseStatus::Rejected),
            "more_info_required" => Some(CaseStatus::MoreInfoRequired),
            _ => None,
        }
    }

    /// Approved and Rejected never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Approved | CaseStatus::Rejected)
    }

    /// Statuses that place a case on the manual review queue.
    pub fn is_pending_manual(&self) -> bool {
        matches!(self, CaseStatus::ReviewReady | CaseStatus::MoreInfoRequired)
    }

    /// Whether `self -> to` is an edge of the status graph.
    ///
    /// `Processing -> Queued` is the stale-lock recovery edge;
    /// `MoreInfoRequired -> MoreInfoRequired` covers a repeated
    /// request-more-info decision.
    pub fn can_transition(self, to: CaseStatus) -> bool {
        use CaseStatus::*;
        matches!(
            (self, to),
            (Draft, DocumentsUploaded)
                | (DocumentsUploaded, Queued)
                | (Queued, Processing)
                | (Processing, ReviewReady)
                | (Processing, DocumentsUploaded)
                | (Processing, Queued)
                | (ReviewReady, Approved)
                | (ReviewReady, Rejected)
                | (ReviewReady, MoreInfoRequired)
                | (ReviewReady, Queued)
                | (MoreInfoRequired, Queued)
                | (MoreInfoRequired, Approved)
                | (MoreInfoRequired, Rejected)
                | (MoreInfoRequired, MoreInfoRequired)
        )
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Risk level ──────────────────────────────────────────────────────

/// Deterministic bucketing of the aggregate confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }

    /// Bucket a confidence score: >= 0.75 low, >= 0.50 medium, else high.
    pub fn from_confidence(confidence_score: f64) -> Self {
        if confidence_score >= 0.75 {
            RiskLevel::Low
        } else if confidence_score >= 0.50 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── DB row / API shape ──────────────────────────────────────────────

/// A citizenship application (case). Serves as both the DB row and the
/// API response shape; it carries nothing confidential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct Case {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub applicant_full_name: String,
    pub applicant_nationality: String,
    pub applicant_birth_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: String,
    pub confidence_score: Option<f64>,
    pub risk_level: Option<String>,
    pub recommendation_summary: Option<String>,
    pub priority_score: f64,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub queued_at: Option<DateTime<Utc>>,
    pub final_decision: Option<String>,
    pub final_decision_reason: Option<String>,
    pub final_decision_by_id: Option<Uuid>,
    pub final_decision_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Typed view of the stored status string. Unknown strings map to
    /// `Draft` only in corrupted databases; callers treat that as Draft.
    pub fn case_status(&self) -> CaseStatus {
        CaseStatus::parse(&self.status).unwrap_or(CaseStatus::Draft)
    }
}

/// List response wrapper for cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CasesPublic {
    pub data: Vec<Case>,
    pub count: i64,
}

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateCaseRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub applicant_full_name: String,
    #[validate(length(min = 1, max = 128, message = "must be 1-128 characters"))]
    pub applicant_nationality: String,
    pub applicant_birth_date: Option<DateTime<Utc>>,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Partial case update. Derived fields (status, scores, SLA, decision) are
/// not part of this shape and cannot be patched.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateCaseRequest {
    #[validate(length(min = 1, max = 255, message = "must be 1-255 characters"))]
    pub applicant_full_name: Option<String>,
    #[validate(length(min = 1, max = 128, message = "must be 1-128 characters"))]
    pub applicant_nationality: Option<String>,
    pub applicant_birth_date: Option<DateTime<Utc>>,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub notes: Option<String>,
}

impl UpdateCaseRequest {
    pub fn is_empty(&self) -> bool {
        self.applicant_full_name.is_none()
            && self.applicant_nationality.is_none()
            && self.applicant_birth_date.is_none()
            && self.notes.is_none()
    }
}

/// Body for `POST /applications/{id}/process`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProcessRequest {
    #[serde(default)]
    pub force_reprocess: bool,
}

// ── Review decisions ────────────────────────────────────────────────

/// Reviewer actions on a pending-manual case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecisionAction {
    Approve,
    Reject,
    RequestMoreInfo,
}

impl ReviewDecisionAction {
    pub fn target_status(&self) -> CaseStatus {
        match self {
            ReviewDecisionAction::Approve => CaseStatus::Approved,
            ReviewDecisionAction::Reject => CaseStatus::Rejected,
            ReviewDecisionAction::RequestMoreInfo => CaseStatus::MoreInfoRequired,
        }
    }

    /// Stable audit action key for this decision.
    pub fn audit_action(&self) -> &'static str {
        match self {
            ReviewDecisionAction::Approve => "review_approved",
            ReviewDecisionAction::Reject => "review_rejected",
            ReviewDecisionAction::RequestMoreInfo => "more_info_requested",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReviewDecisionRequest {
    pub action: ReviewDecisionAction,
    pub reason: String,
}
