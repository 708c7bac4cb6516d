//! Weighted eligibility rule engine.
//!
//! A fixed registry of rules is evaluated over the aggregated evidence of a
//! case. The engine is a pure function: identical inputs produce
//! byte-identical output, so two processing runs over the same documents
//! agree exactly.

use serde_json::{json, Value};
use shared_types::{DocumentStatus, ExtractedFields, RiskLevel};

// ── Inputs ──────────────────────────────────────────────────────────

/// One document's contribution to rule evaluation.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    /// Normalized (trimmed, lowercased) document type label.
    pub document_type: String,
    pub status: DocumentStatus,
    pub fields: ExtractedFields,
}

/// Aggregated evidence of a case.
#[derive(Debug, Clone, Default)]
pub struct RuleInput {
    pub notes: String,
    pub documents: Vec<DocumentInput>,
}

impl RuleInput {
    fn has_document_type(&self, types: &[&str]) -> bool {
        self.documents
            .iter()
            .any(|d| types.contains(&d.document_type.as_str()))
    }

    fn document_types_sorted(&self) -> Vec<String> {
        let mut types: Vec<String> =
            self.documents.iter().map(|d| d.document_type.clone()).collect();
        types.sort();
        types.dedup();
        types
    }

    fn passport_identifiers(&self) -> Vec<String> {
        let mut out = Vec::new();
        for doc in &self.documents {
            for id in &doc.fields.identifiers.passport {
                if !out.contains(id) {
                    out.push(id.clone());
                }
            }
        }
        out
    }

    fn residency_signals(&self) -> Vec<String> {
        let mut out = Vec::new();
        for doc in &self.documents {
            for signal in &doc.fields.signals.residency {
                if !out.contains(signal) {
                    out.push(signal.clone());
                }
            }
        }
        out
    }

    fn language_signals(&self) -> Vec<String> {
        let mut out = Vec::new();
        for doc in &self.documents {
            for signal in &doc.fields.signals.language {
                if !out.contains(signal) {
                    out.push(signal.clone());
                }
            }
        }
        out
    }

    fn total_distinct_entities(&self) -> usize {
        self.documents
            .iter()
            .map(|d| d.fields.distinct_entity_count())
            .sum()
    }
}

// ── Rule registry ───────────────────────────────────────────────────

/// Outcome of a single rule evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub passed: bool,
    pub score: f64,
    pub rationale: String,
    pub evidence: Value,
}

/// A rule as a value: stable code, display name, weight, evaluator.
pub struct RuleSpec {
    pub code: &'static str,
    pub name: &'static str,
    pub weight: f64,
    pub evaluate: fn(&RuleInput) -> RuleOutcome,
}

/// The canonical rule catalog, in evaluation (and tie-break) order.
/// Weights sum to exactly 1.0.
pub static RULES: &[RuleSpec] = &[
    RuleSpec {
        code: "identity_document_present",
        name: "Identity document present",
        weight: 0.20,
        evaluate: identity_document_present,
    },
    RuleSpec {
        code: "residency_evidence_present",
        name: "Residency evidence present",
        weight: 0.18,
        evaluate: residency_evidence_present,
    },
    RuleSpec {
        code: "document_quality",
        name: "Document OCR/NLP quality",
        weight: 0.17,
        evaluate: document_quality,
    },
    RuleSpec {
        code: "language_integration_evidence",
        name: "Language/integration evidence",
        weight: 0.15,
        evaluate: language_integration_evidence,
    },
    RuleSpec {
        code: "security_screening_evidence",
        name: "Security screening evidence",
        weight: 0.15,
        evaluate: security_screening_evidence,
    },
    RuleSpec {
        code: "nlp_entity_richness",
        name: "NLP entity richness",
        weight: 0.10,
        evaluate: nlp_entity_richness,
    },
    RuleSpec {
        code: "residency_duration_signal",
        name: "Residency duration signal",
        weight: 0.05,
        evaluate: residency_duration_signal,
    },
];

const IDENTITY_TYPES: &[&str] = &["passport", "id_card"];
const RESIDENCY_TYPES: &[&str] = &["residence_permit", "residence_proof", "tax_statement"];
const LANGUAGE_TYPES: &[&str] = &[
    "language_certificate",
    "norwegian_test",
    "education_certificate",
];

fn identity_document_present(input: &RuleInput) -> RuleOutcome {
    let has_identity_type = input.has_document_type(IDENTITY_TYPES);
    let passports = input.passport_identifiers();

    let (score, rationale) = if has_identity_type {
        (1.0, "Passport or national ID document uploaded".to_string())
    } else if !passports.is_empty() {
        (
            0.6,
            "Passport number extracted from text without an identity document".to_string(),
        )
    } else {
        (0.0, "No passport or national ID evidence".to_string())
    };

    RuleOutcome {
        passed: score >= 0.6,
        score,
        rationale,
        evidence: json!({
            "document_types": input.document_types_sorted(),
            "passport_identifiers": passports,
        }),
    }
}

fn residency_evidence_present(input: &RuleInput) -> RuleOutcome {
    let has_residency_type = input.has_document_type(RESIDENCY_TYPES);
    let signals = input.residency_signals();

    let (score, rationale) = if has_residency_type {
        (1.0, "Residency document uploaded".to_string())
    } else if !signals.is_empty() {
        (0.5, "Residency signals found in document text".to_string())
    } else {
        (0.0, "No residency document or text signals".to_string())
    };

    RuleOutcome {
        passed: score >= 0.5,
        score,
        rationale,
        evidence: json!({
            "document_types": input.document_types_sorted(),
            "residency_signals": truncate(&signals, 5),
        }),
    }
}

fn document_quality(input: &RuleInput) -> RuleOutcome {
    let processed: Vec<&DocumentInput> = input
        .documents
        .iter()
        .filter(|d| d.status == DocumentStatus::Processed)
        .collect();

    let quality = if processed.is_empty() {
        0.0
    } else {
        processed.iter().map(|d| d.fields.entity_richness).sum::<f64>() / processed.len() as f64
    };
    let score = round4(quality);

    RuleOutcome {
        passed: score >= 0.4,
        score,
        rationale: format!(
            "Mean entity richness {score:.2} across {} processed of {} documents",
            processed.len(),
            input.documents.len()
        ),
        evidence: json!({
            "processed_documents": processed.len(),
            "total_documents": input.documents.len(),
            "mean_entity_richness": score,
        }),
    }
}

fn language_integration_evidence(input: &RuleInput) -> RuleOutcome {
    let has_language_type = input.has_document_type(LANGUAGE_TYPES);
    let signals = input.language_signals();

    let (score, rationale) = if has_language_type {
        (1.0, "Language or integration certificate uploaded".to_string())
    } else if !signals.is_empty() {
        (0.6, "Language proficiency signals found in text".to_string())
    } else {
        (0.0, "No language certificate or text signals".to_string())
    };

    RuleOutcome {
        passed: score >= 0.6,
        score,
        rationale,
        evidence: json!({
            "document_types": input.document_types_sorted(),
            "language_signals": truncate(&signals, 5),
        }),
    }
}

fn security_screening_evidence(input: &RuleInput) -> RuleOutcome {
    let has_police_clearance = input.has_document_type(&["police_clearance"]);
    let score = if has_police_clearance { 1.0 } else { 0.0 };

    RuleOutcome {
        passed: has_police_clearance,
        score,
        rationale: if has_police_clearance {
            "Police clearance document uploaded".to_string()
        } else {
            "No police clearance document".to_string()
        },
        evidence: json!({ "document_types": input.document_types_sorted() }),
    }
}

fn nlp_entity_richness(input: &RuleInput) -> RuleOutcome {
    let total = input.total_distinct_entities();
    let score = round4((total as f64 / 40.0).min(1.0));

    RuleOutcome {
        passed: total >= 10,
        score,
        rationale: format!(
            "{total} distinct entities extracted across {} documents",
            input.documents.len()
        ),
        evidence: json!({
            "total_distinct_entities": total,
            "document_count": input.documents.len(),
        }),
    }
}

/// A residency signal counts as a duration phrase when it speaks about
/// time: "7 years", "botid", "permanent opphold" and the like.
fn is_duration_phrase(signal: &str) -> bool {
    let lower = signal.to_lowercase();
    ["year", "år", "botid", "permanent", "sammenhengende", "continuous"]
        .iter()
        .any(|marker| lower.contains(marker))
}

fn residency_duration_signal(input: &RuleInput) -> RuleOutcome {
    let notes = input.notes.to_lowercase();
    let notes_mention_duration = ["long-term", "years", "permanent"]
        .iter()
        .any(|needle| notes.contains(needle));

    let signals = input.residency_signals();
    let duration_phrases: Vec<&String> = signals
        .iter()
        .filter(|s| is_duration_phrase(s))
        .collect();

    let (score, rationale) = if notes_mention_duration || !duration_phrases.is_empty() {
        (
            1.0,
            if notes_mention_duration {
                "Residency duration stated in case notes".to_string()
            } else {
                "Residency duration phrase found in document text".to_string()
            },
        )
    } else if !signals.is_empty() {
        (0.5, "Residency signals present without duration".to_string())
    } else {
        (0.0, "No residency duration signal".to_string())
    };

    RuleOutcome {
        passed: score >= 0.5,
        score,
        rationale,
        evidence: json!({
            "notes_mention_duration": notes_mention_duration,
            "duration_phrases": duration_phrases.iter().take(5).collect::<Vec<_>>(),
            "residency_signals": truncate(&signals, 5),
        }),
    }
}

// ── Evaluation ──────────────────────────────────────────────────────

/// One evaluated rule, ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedRule {
    pub rule_code: &'static str,
    pub rule_name: &'static str,
    pub passed: bool,
    pub score: f64,
    pub weight: f64,
    pub rationale: String,
    pub evidence: Value,
}

/// Full engine output for a case.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub rules: Vec<EvaluatedRule>,
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    pub recommendation_summary: String,
}

/// Evaluate the rule catalog over the aggregated evidence of a case.
pub fn evaluate(input: &RuleInput) -> Evaluation {
    let rules: Vec<EvaluatedRule> = RULES
        .iter()
        .map(|spec| {
            let outcome = (spec.evaluate)(input);
            EvaluatedRule {
                rule_code: spec.code,
                rule_name: spec.name,
                passed: outcome.passed,
                score: outcome.score.clamp(0.0, 1.0),
                weight: spec.weight,
                rationale: outcome.rationale,
                evidence: outcome.evidence,
            }
        })
        .collect();

    let confidence_score = round4(rules.iter().map(|r| r.score * r.weight).sum());
    let risk_level = RiskLevel::from_confidence(confidence_score);
    let recommendation_summary = recommendation(risk_level, &rules);

    Evaluation {
        rules,
        confidence_score,
        risk_level,
        recommendation_summary,
    }
}

/// Short reviewer-facing sentence derived from the risk level and the two
/// heaviest failed rules (ties broken by catalog order).
fn recommendation(risk: RiskLevel, rules: &[EvaluatedRule]) -> String {
    let base = match risk {
        RiskLevel::Low => "Strong automated evidence; eligible for fast-track manual verification",
        RiskLevel::Medium => "Borderline automated evidence; prioritize targeted human review",
        RiskLevel::High => "Weak automated evidence; request additional documentation",
    };

    let mut failed: Vec<&EvaluatedRule> = rules.iter().filter(|r| !r.passed).collect();
    // Stable sort keeps catalog order among equal weights.
    failed.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));

    if failed.is_empty() {
        format!("{base}. All eligibility rules passed.")
    } else {
        let top: Vec<&str> = failed.iter().take(2).map(|r| r.rule_name).collect();
        format!("{base}. Weakest areas: {}.", top.join(", "))
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// First `n` entries, for evidence payloads that should stay small.
fn truncate(items: &[String], n: usize) -> Vec<String> {
    items.iter().take(n).cloned().collect()
}
