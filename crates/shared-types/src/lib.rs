pub mod advisory;
pub mod audit;
pub mod case;
pub mod document;
pub mod error;
pub mod queue;
pub mod rule;
pub mod user;

pub use advisory::{CaseExplanation, EvidenceRecommendations, RecommendedAction};
pub use audit::{actions, AuditEvent, AuditTrailPublic};
pub use case::{
    Case, CaseStatus, CasesPublic, CreateCaseRequest, ProcessRequest, ReviewDecisionAction,
    ReviewDecisionRequest, RiskLevel, UpdateCaseRequest,
};
pub use document::{
    is_allowed_content_type, Document, DocumentStatus, DocumentsPublic, ExtractedFields,
    Identifiers, Keywords, Signals, ALLOWED_CONTENT_TYPES,
};
pub use error::{AppError, AppErrorKind};
pub use queue::{
    age_factor, estimated_days_to_clear_backlog, is_overdue, priority_score, QueueMetrics,
    ReviewQueueItem, ReviewQueuePublic, SlaWindows,
};
pub use rule::{DecisionBreakdown, RuleResult};
pub use user::{LoginRequest, Token, User, UserPublic, UserSignupRequest, UserUpdateMeRequest};

/// Generic message payload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
