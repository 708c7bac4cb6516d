//! Deterministic advisory output derived from the rule breakdown.

use chrono::Utc;
use shared_types::{
    Case, CaseExplanation, Document, EvidenceRecommendations, RecommendedAction, RiskLevel,
    RuleResult,
};
use std::collections::BTreeMap;

/// Which document types satisfy each evidence rule, used to propose
/// uploads for failed rules.
const RULE_DOCUMENT_OPTIONS: &[(&str, &[&str])] = &[
    ("identity_document_present", &["passport", "id_card"]),
    (
        "residency_evidence_present",
        &["residence_permit", "residence_proof", "tax_statement"],
    ),
    (
        "language_integration_evidence",
        &["language_certificate", "norwegian_test", "education_certificate"],
    ),
    ("security_screening_evidence", &["police_clearance"]),
];

/// Failed rules, heaviest first. The repo returns rules ordered by weight
/// already, but sorting here keeps the function total.
fn failed_rules_by_weight(rules: &[RuleResult]) -> Vec<&RuleResult> {
    let mut failed: Vec<&RuleResult> = rules.iter().filter(|r| !r.passed).collect();
    failed.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    failed
}

fn uploaded_types(documents: &[Document]) -> Vec<String> {
    let mut types: Vec<String> = documents.iter().map(|d| d.normalized_type()).collect();
    types.sort();
    types.dedup();
    types
}

/// Deterministic explainer output built from the breakdown alone.
pub fn fallback_explanation(
    case: &Case,
    rules: &[RuleResult],
    documents: &[Document],
    risk: RiskLevel,
) -> CaseExplanation {
    let failed = failed_rules_by_weight(rules);

    let mut key_risks: Vec<String> = failed.iter().take(3).map(|r| r.rule_name.clone()).collect();
    if key_risks.is_empty() {
        key_risks.push("No critical rule failures detected".to_string());
    }

    let mut missing_evidence: Vec<String> =
        failed.iter().take(3).map(|r| r.rationale.clone()).collect();
    if missing_evidence.is_empty() {
        missing_evidence.push("No material evidence gaps identified".to_string());
    }

    let types = uploaded_types(documents);
    let mut next_steps = vec![
        "Validate identity details against uploaded evidence".to_string(),
        "Confirm residency and language requirements against the policy checklist".to_string(),
        "Capture the final caseworker reason before decision submission".to_string(),
    ];
    if !types.iter().any(|t| t == "police_clearance") {
        next_steps.insert(
            0,
            "Request police clearance evidence for security screening".to_string(),
        );
    }
    if !types
        .iter()
        .any(|t| t == "residence_permit" || t == "residence_proof")
    {
        next_steps.insert(0, "Request residency proof document".to_string());
    }
    next_steps.truncate(4);

    CaseExplanation {
        application_id: case.id,
        summary: format!(
            "Application {} is currently {} risk with {} rule gap(s). \
             Prioritize evidence validation and a documented human decision.",
            case.id,
            risk,
            failed.len()
        ),
        recommended_action: RecommendedAction::from_risk(risk),
        key_risks,
        missing_evidence,
        next_steps,
        generated_by: "fallback:rules-v1".to_string(),
        generated_at: Utc::now(),
    }
}

/// Deterministic evidence-gap report: failed rules propose the document
/// types that would satisfy them, minus those already uploaded.
pub fn fallback_recommendations(
    case: &Case,
    rules: &[RuleResult],
    documents: &[Document],
    risk: RiskLevel,
) -> EvidenceRecommendations {
    let uploaded = uploaded_types(documents);
    let failed = failed_rules_by_weight(rules);

    let mut recommended_document_types: Vec<String> = Vec::new();
    let mut rationale_by_document_type: BTreeMap<String, String> = BTreeMap::new();

    for (rule_code, candidates) in RULE_DOCUMENT_OPTIONS {
        let Some(failed_rule) = failed.iter().find(|r| r.rule_code == *rule_code) else {
            continue;
        };
        for candidate in *candidates {
            if uploaded.iter().any(|t| t == candidate) {
                continue;
            }
            if !recommended_document_types.iter().any(|t| t == candidate) {
                recommended_document_types.push(candidate.to_string());
            }
            rationale_by_document_type
                .insert(candidate.to_string(), failed_rule.rationale.clone());
        }
    }

    let mut recommended_next_actions = vec![
        "Request only high-impact missing documents first".to_string(),
        "Re-run processing after document upload".to_string(),
        "Review the updated rule breakdown before the final decision".to_string(),
    ];
    match risk {
        RiskLevel::High => recommended_next_actions.insert(
            0,
            "Prioritize this application for immediate reviewer follow-up".to_string(),
        ),
        RiskLevel::Medium => recommended_next_actions.insert(
            0,
            "Schedule a targeted reviewer check after the top missing evidence arrives".to_string(),
        ),
        RiskLevel::Low => {}
    }
    recommended_next_actions.truncate(4);

    EvidenceRecommendations {
        application_id: case.id,
        recommended_document_types,
        rationale_by_document_type,
        recommended_next_actions,
        generated_by: "fallback:evidence-recommendation-v1".to_string(),
        generated_at: Utc::now(),
    }
}
