use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Content types accepted for document upload.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/webp",
];

pub fn is_allowed_content_type(content_type: &str) -> bool {
    ALLOWED_CONTENT_TYPES.contains(&content_type)
}

// ── Document status ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(DocumentStatus::Uploaded),
            "processing" => Some(DocumentStatus::Processing),
            "processed" => Some(DocumentStatus::Processed),
            "failed" => Some(DocumentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Extracted fields bag ────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Identifiers {
    #[serde(default)]
    pub passport: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Keywords {
    #[serde(default)]
    pub citizenship: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Signals {
    #[serde(default)]
    pub language: Vec<String>,
    #[serde(default)]
    pub residency: Vec<String>,
}

/// Structured evidence extracted from a single document.
///
/// Known keys are typed; anything else (extraction method, OCR confidence,
/// warnings, future additions) rides in the open extension map so the
/// persisted JSON can grow without schema churn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExtractedFields {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub identifiers: Identifiers,
    #[serde(default)]
    pub nationalities: Vec<String>,
    #[serde(default)]
    pub persons: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub keywords: Keywords,
    #[serde(default)]
    pub signals: Signals,
    /// `min(1, total_distinct_entities / 20)`.
    #[serde(default)]
    pub entity_richness: f64,
    #[serde(flatten)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extra: Map<String, Value>,
}

impl ExtractedFields {
    /// Total number of distinct extracted entities across all categories.
    /// Each category vec holds deduplicated values by construction.
    pub fn distinct_entity_count(&self) -> usize {
        self.dates.len()
            + self.identifiers.passport.len()
            + self.nationalities.len()
            + self.persons.len()
            + self.locations.len()
            + self.keywords.citizenship.len()
            + self.signals.language.len()
            + self.signals.residency.len()
    }

    /// Recompute `entity_richness` from the current entity counts.
    pub fn compute_richness(&mut self) {
        self.entity_richness = (self.distinct_entity_count() as f64 / 20.0).min(1.0);
    }

    pub fn is_empty(&self) -> bool {
        self.distinct_entity_count() == 0
    }

    /// Parse the persisted JSON bag; malformed or legacy payloads degrade
    /// to an empty bag rather than failing the read.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

// ── DB row / API shape ──────────────────────────────────────────────

/// An uploaded supporting document. `extracted_fields` is the persisted
/// JSON form of [`ExtractedFields`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct Document {
    pub id: Uuid,
    pub application_id: Uuid,
    pub document_type: String,
    pub original_filename: String,
    pub content_type: String,
    pub file_size_bytes: i64,
    pub storage_key: String,
    pub status: String,
    pub extracted_text: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extracted_fields: Value,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn document_status(&self) -> DocumentStatus {
        DocumentStatus::parse(&self.status).unwrap_or(DocumentStatus::Uploaded)
    }

    pub fn fields(&self) -> ExtractedFields {
        ExtractedFields::from_value(&self.extracted_fields)
    }

    /// Document type normalized for rule matching.
    pub fn normalized_type(&self) -> String {
        self.document_type.trim().to_lowercase()
    }
}

/// List response wrapper for documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DocumentsPublic {
    pub data: Vec<Document>,
    pub count: i64,
}
