use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Categorization of application errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AppErrorKind {
    NotFound,
    Unauthorized,
    Forbidden,
    InvalidInput,
    InvalidTransition,
    AlreadyProcessing,
    NoDocuments,
    Conflict,
    ExtractionError,
    RuleEngineError,
    StorageError,
    AdvisoryUnavailable,
    InternalError,
}

impl fmt::Display for AppErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppErrorKind::NotFound => write!(f, "NotFound"),
            AppErrorKind::Unauthorized => write!(f, "Unauthorized"),
            AppErrorKind::Forbidden => write!(f, "Forbidden"),
            AppErrorKind::InvalidInput => write!(f, "InvalidInput"),
            AppErrorKind::InvalidTransition => write!(f, "InvalidTransition"),
            AppErrorKind::AlreadyProcessing => write!(f, "AlreadyProcessing"),
            AppErrorKind::NoDocuments => write!(f, "NoDocuments"),
            AppErrorKind::Conflict => write!(f, "Conflict"),
            AppErrorKind::ExtractionError => write!(f, "ExtractionError"),
            AppErrorKind::RuleEngineError => write!(f, "RuleEngineError"),
            AppErrorKind::StorageError => write!(f, "StorageError"),
            AppErrorKind::AdvisoryUnavailable => write!(f, "AdvisoryUnavailable"),
            AppErrorKind::InternalError => write!(f, "InternalError"),
        }
    }
}

/// Structured application error used across the server and API clients.
///
/// `StorageError` variants carry a stable `incident_id` so operators can
/// correlate a 500 response with server logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AppError {
    pub kind: AppErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_errors: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<String>,
}

impl AppError {
    fn new(kind: AppErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: HashMap::new(),
            incident_id: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Forbidden, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::InvalidInput, message)
    }

    pub fn validation(message: impl Into<String>, field_errors: HashMap<String, String>) -> Self {
        Self {
            kind: AppErrorKind::InvalidInput,
            message: message.into(),
            field_errors,
            incident_id: None,
        }
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::InvalidTransition, message)
    }

    pub fn already_processing(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::AlreadyProcessing, message)
    }

    pub fn no_documents(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::NoDocuments, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Conflict, message)
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::ExtractionError, message)
    }

    pub fn rule_engine(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::RuleEngineError, message)
    }

    /// Storage failure with a generated incident identifier. The detailed
    /// cause goes to the log, not to the client.
    pub fn storage(message: impl Into<String>) -> Self {
        Self {
            kind: AppErrorKind::StorageError,
            message: message.into(),
            field_errors: HashMap::new(),
            incident_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    pub fn advisory_unavailable(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::AdvisoryUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::InternalError, message)
    }

    #[cfg_attr(not(feature = "server"), allow(dead_code))]
    fn status_code_u16(&self) -> u16 {
        match self.kind {
            AppErrorKind::NotFound => 404,
            AppErrorKind::Unauthorized => 401,
            AppErrorKind::Forbidden => 403,
            AppErrorKind::InvalidInput => 422,
            AppErrorKind::InvalidTransition => 409,
            AppErrorKind::AlreadyProcessing => 409,
            AppErrorKind::NoDocuments => 400,
            AppErrorKind::Conflict => 409,
            AppErrorKind::ExtractionError => 500,
            AppErrorKind::RuleEngineError => 500,
            AppErrorKind::StorageError => 500,
            AppErrorKind::AdvisoryUnavailable => 503,
            AppErrorKind::InternalError => 500,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for AppError {}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut field_errors = HashMap::new();
        for (field, errs) in errors.field_errors() {
            if let Some(first) = errs.first() {
                let msg = first
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                field_errors.insert(field.to_string(), msg);
            }
        }
        AppError::validation("Validation failed", field_errors)
    }
}

#[cfg(feature = "server")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.status_code_u16())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        assert_eq!(AppError::not_found("").status_code_u16(), 404);
        assert_eq!(AppError::unauthorized("").status_code_u16(), 401);
        assert_eq!(AppError::forbidden("").status_code_u16(), 403);
        assert_eq!(AppError::invalid_input("").status_code_u16(), 422);
        assert_eq!(AppError::invalid_transition("").status_code_u16(), 409);
        assert_eq!(AppError::already_processing("").status_code_u16(), 409);
        assert_eq!(AppError::no_documents("").status_code_u16(), 400);
        assert_eq!(AppError::conflict("").status_code_u16(), 409);
        assert_eq!(AppError::storage("").status_code_u16(), 500);
    }

    #[test]
    fn storage_error_carries_incident_id() {
        let err = AppError::storage("commit failed");
        assert!(err.incident_id.is_some());
        // Two incidents must not share an identifier.
        assert_ne!(err.incident_id, AppError::storage("again").incident_id);
    }

    #[test]
    fn validation_error_includes_field_errors() {
        let mut fields = HashMap::new();
        fields.insert("reason".to_string(), "too short".to_string());
        let err = AppError::validation("Validation failed", fields);
        assert_eq!(err.kind, AppErrorKind::InvalidInput);
        assert_eq!(err.field_errors.get("reason").unwrap(), "too short");
    }

    #[test]
    fn display_impl_formats_kind_and_message() {
        let err = AppError::invalid_transition("draft cannot move to approved");
        assert_eq!(
            format!("{}", err),
            "InvalidTransition: draft cannot move to approved"
        );
    }

    #[test]
    fn error_roundtrip_through_json() {
        let err = AppError::already_processing("case busy");
        let json = serde_json::to_string(&err).unwrap();
        let parsed: AppError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, parsed);
    }
}
