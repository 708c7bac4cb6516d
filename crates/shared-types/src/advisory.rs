use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::case::RiskLevel;

/// Advisory action suggestion. Advisory output never drives state; this
/// is guidance for the reviewer only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Approve,
    Reject,
    RequestMoreInfo,
}

impl RecommendedAction {
    /// Deterministic fallback mapping from risk level.
    pub fn from_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => RecommendedAction::Approve,
            RiskLevel::Medium => RecommendedAction::RequestMoreInfo,
            RiskLevel::High => RecommendedAction::Reject,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::Approve => "approve",
            RecommendedAction::Reject => "reject",
            RecommendedAction::RequestMoreInfo => "request_more_info",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(RecommendedAction::Approve),
            "reject" => Some(RecommendedAction::Reject),
            "request_more_info" => Some(RecommendedAction::RequestMoreInfo),
            _ => None,
        }
    }
}

/// Advisory memo for a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CaseExplanation {
    pub application_id: Uuid,
    pub summary: String,
    pub recommended_action: RecommendedAction,
    pub key_risks: Vec<String>,
    pub missing_evidence: Vec<String>,
    pub next_steps: Vec<String>,
    /// Provenance tag, e.g. `fallback:rules-v1` or `llm:<model>`.
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

/// Advisory evidence-gap report for a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EvidenceRecommendations {
    pub application_id: Uuid,
    pub recommended_document_types: Vec<String>,
    /// Ordered map so output is byte-stable across calls.
    pub rationale_by_document_type: BTreeMap<String, String>,
    pub recommended_next_actions: Vec<String>,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_maps_to_fallback_action() {
        assert_eq!(
            RecommendedAction::from_risk(RiskLevel::Low),
            RecommendedAction::Approve
        );
        assert_eq!(
            RecommendedAction::from_risk(RiskLevel::Medium),
            RecommendedAction::RequestMoreInfo
        );
        assert_eq!(
            RecommendedAction::from_risk(RiskLevel::High),
            RecommendedAction::Reject
        );
    }

    #[test]
    fn action_string_roundtrip() {
        for action in [
            RecommendedAction::Approve,
            RecommendedAction::Reject,
            RecommendedAction::RequestMoreInfo,
        ] {
            assert_eq!(RecommendedAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(RecommendedAction::parse("escalate"), None);
    }
}
