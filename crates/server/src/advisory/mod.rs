//! AI Advisory: read-only explainer and evidence-gap reports.
//!
//! An external generator may enhance the case explainer, but the
//! deterministic fallback always exists and advisory output never mutates
//! case state. Generator output is schema-validated; any violation falls
//! back and is audited.

mod fallback;
mod http;

pub use fallback::{fallback_explanation, fallback_recommendations};
pub use http::HttpGenerator;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::{
    actions, AppError, Case, CaseExplanation, EvidenceRecommendations, RecommendedAction,
    RiskLevel,
};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::repo;

/// Raw generator output, before validation. Unknown fields are rejected:
/// the external model must match the schema exactly.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedExplanation {
    pub summary: String,
    pub recommended_action: String,
    pub key_risks: Vec<String>,
    pub missing_evidence: Vec<String>,
    pub next_steps: Vec<String>,
}

/// Abstract advisory provider.
#[async_trait]
pub trait AdvisoryGenerator: Send + Sync {
    /// Generate an explanation from the serialized case context.
    async fn generate_explanation(&self, context: &Value) -> Result<GeneratedExplanation, String>;

    /// Whether an external generator is actually configured.
    fn is_configured(&self) -> bool;

    /// Provenance label, e.g. `llm:<model>`.
    fn label(&self) -> String;
}

/// Placeholder when no external generator is configured; the fallback is
/// used without any audit noise.
pub struct NoGenerator;

#[async_trait]
impl AdvisoryGenerator for NoGenerator {
    async fn generate_explanation(
        &self,
        _context: &Value,
    ) -> Result<GeneratedExplanation, String> {
        Err("no advisory generator configured".to_string())
    }

    fn is_configured(&self) -> bool {
        false
    }

    fn label(&self) -> String {
        "none".to_string()
    }
}

/// Risk level for advisory purposes: the stored value when present, else
/// derived from the stored confidence (absent scores read as high risk).
fn advisory_risk(case: &Case) -> RiskLevel {
    case.risk_level
        .as_deref()
        .and_then(RiskLevel::parse)
        .unwrap_or_else(|| RiskLevel::from_confidence(case.confidence_score.unwrap_or(0.0)))
}

/// Produce the advisory memo for a case. Never fails on generator
/// problems; the deterministic fallback always answers.
pub async fn case_explainer(
    pool: &Pool<Postgres>,
    generator: &dyn AdvisoryGenerator,
    case: &Case,
    actor: Uuid,
) -> Result<CaseExplanation, AppError> {
    let rules = repo::rule_result::list_by_case(pool, case.id).await?;
    let documents = repo::document::list_by_case(pool, case.id).await?;
    let risk = advisory_risk(case);

    let fallback = fallback_explanation(case, &rules, &documents, risk);
    if !generator.is_configured() {
        return Ok(fallback);
    }

    let audit_events = repo::audit::list_by_case(pool, case.id).await?;
    let context = build_context(case, risk, &rules, &documents, &audit_events);

    match generator.generate_explanation(&context).await {
        Ok(raw) => match validate_explanation(raw) {
            Ok(validated) => Ok(CaseExplanation {
                application_id: case.id,
                summary: validated.summary,
                recommended_action: validated.recommended_action,
                key_risks: validated.key_risks,
                missing_evidence: validated.missing_evidence,
                next_steps: validated.next_steps,
                generated_by: generator.label(),
                generated_at: Utc::now(),
            }),
            Err(violation) => {
                audit_fallback(pool, case.id, actor, &violation).await;
                Ok(fallback)
            }
        },
        Err(failure) => {
            audit_fallback(pool, case.id, actor, &failure).await;
            Ok(fallback)
        }
    }
}

/// Produce the evidence-gap report. Deterministic by construction.
pub async fn evidence_recommendations(
    pool: &Pool<Postgres>,
    case: &Case,
) -> Result<EvidenceRecommendations, AppError> {
    let rules = repo::rule_result::list_by_case(pool, case.id).await?;
    let documents = repo::document::list_by_case(pool, case.id).await?;
    let risk = advisory_risk(case);
    Ok(fallback_recommendations(case, &rules, &documents, risk))
}

/// Validated external output, with the action parsed against the enum.
struct ValidatedExplanation {
    summary: String,
    recommended_action: RecommendedAction,
    key_risks: Vec<String>,
    missing_evidence: Vec<String>,
    next_steps: Vec<String>,
}

fn validate_explanation(raw: GeneratedExplanation) -> Result<ValidatedExplanation, String> {
    let summary = raw.summary.trim().to_string();
    if summary.is_empty() {
        return Err("summary is empty".to_string());
    }
    let recommended_action = RecommendedAction::parse(raw.recommended_action.trim())
        .ok_or_else(|| format!("unknown recommended_action: {}", raw.recommended_action))?;

    let clean = |items: Vec<String>, field: &str| -> Result<Vec<String>, String> {
        let cleaned: Vec<String> = items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(5)
            .collect();
        if cleaned.is_empty() {
            Err(format!("{field} is empty"))
        } else {
            Ok(cleaned)
        }
    };

    Ok(ValidatedExplanation {
        summary,
        recommended_action,
        key_risks: clean(raw.key_risks, "key_risks")?,
        missing_evidence: clean(raw.missing_evidence, "missing_evidence")?,
        next_steps: clean(raw.next_steps, "next_steps")?,
    })
}

async fn audit_fallback(pool: &Pool<Postgres>, case_id: Uuid, actor: Uuid, reason: &str) {
    tracing::warn!(case_id = %case_id, "advisory generator failed, using fallback: {reason}");
    let _ = repo::audit::append(
        pool,
        case_id,
        actions::ADVISORY_FALLBACK,
        Some(actor),
        Some(reason),
        json!({}),
    )
    .await;
}

fn build_context(
    case: &Case,
    risk: RiskLevel,
    rules: &[shared_types::RuleResult],
    documents: &[shared_types::Document],
    audit_events: &[shared_types::AuditEvent],
) -> Value {
    json!({
        "application": {
            "id": case.id,
            "status": case.status,
            "applicant_full_name": case.applicant_full_name,
            "applicant_nationality": case.applicant_nationality,
            "recommendation_summary": case.recommendation_summary,
            "confidence_score": case.confidence_score,
            "risk_level": risk.as_str(),
            "notes": case.notes,
        },
        "rules": rules.iter().map(|r| json!({
            "rule_code": r.rule_code,
            "rule_name": r.rule_name,
            "passed": r.passed,
            "score": r.score,
            "weight": r.weight,
            "rationale": r.rationale,
        })).collect::<Vec<_>>(),
        "documents": documents.iter().map(|d| json!({
            "document_type": d.document_type,
            "status": d.status,
            "content_type": d.content_type,
            "processing_error": d.processing_error,
        })).collect::<Vec<_>>(),
        "audit_events": audit_events.iter().rev().take(6).map(|e| json!({
            "action": e.action,
            "reason": e.reason,
            "created_at": e.created_at,
        })).collect::<Vec<_>>(),
    })
}
