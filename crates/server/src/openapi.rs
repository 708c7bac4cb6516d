use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the bearer-token security scheme referenced by handlers.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Medborger API",
        description = "Citizenship application pre-screening and review service"
    ),
    paths(
        crate::health::health_check,
        crate::rest::auth::login,
        crate::rest::auth::signup,
        crate::rest::auth::me,
        crate::rest::auth::update_me,
        crate::rest::application::create_application,
        crate::rest::application::list_applications,
        crate::rest::application::get_application,
        crate::rest::application::update_application,
        crate::rest::application::process_application,
        crate::rest::application::decision_breakdown,
        crate::rest::application::audit_trail,
        crate::rest::document::upload_document,
        crate::rest::document::list_documents,
        crate::rest::review::review_queue,
        crate::rest::review::queue_metrics,
        crate::rest::review::submit_review_decision,
        crate::rest::advisory::case_explainer,
        crate::rest::advisory::evidence_recommendations,
    ),
    components(schemas(
        shared_types::AppError,
        shared_types::AppErrorKind,
        shared_types::Message,
        shared_types::Token,
        shared_types::LoginRequest,
        shared_types::UserSignupRequest,
        shared_types::UserUpdateMeRequest,
        shared_types::UserPublic,
        shared_types::Case,
        shared_types::CasesPublic,
        shared_types::CaseStatus,
        shared_types::RiskLevel,
        shared_types::CreateCaseRequest,
        shared_types::UpdateCaseRequest,
        shared_types::ProcessRequest,
        shared_types::ReviewDecisionAction,
        shared_types::ReviewDecisionRequest,
        shared_types::Document,
        shared_types::DocumentsPublic,
        shared_types::DocumentStatus,
        shared_types::ExtractedFields,
        shared_types::Identifiers,
        shared_types::Keywords,
        shared_types::Signals,
        shared_types::RuleResult,
        shared_types::DecisionBreakdown,
        shared_types::AuditEvent,
        shared_types::AuditTrailPublic,
        shared_types::ReviewQueueItem,
        shared_types::ReviewQueuePublic,
        shared_types::QueueMetrics,
        shared_types::RecommendedAction,
        shared_types::CaseExplanation,
        shared_types::EvidenceRecommendations,
        crate::health::HealthResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication and accounts"),
        (name = "applications", description = "Citizenship applications"),
        (name = "documents", description = "Supporting documents"),
        (name = "review", description = "Reviewer queue and decisions"),
        (name = "advisory", description = "Non-binding advisory output"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// GET /api/v1/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
