use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One evaluated eligibility rule for a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct RuleResult {
    pub id: Uuid,
    pub application_id: Uuid,
    pub rule_code: String,
    pub rule_name: String,
    pub passed: bool,
    pub score: f64,
    pub weight: f64,
    pub rationale: String,
    /// Which documents/entities contributed, as structured JSON.
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub evidence: Value,
    pub evaluated_at: DateTime<Utc>,
}

/// The per-rule evaluation plus aggregate confidence, risk, and
/// recommendation for a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DecisionBreakdown {
    pub application_id: Uuid,
    pub recommendation: String,
    pub confidence_score: f64,
    pub risk_level: String,
    pub rules: Vec<RuleResult>,
}
