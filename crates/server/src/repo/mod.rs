pub mod audit;
pub mod case;
pub mod document;
pub mod lock;
pub mod queue;
pub mod rule_result;
pub mod user;

/// Columns selected for a full case row, shared across queries.
pub(crate) const CASE_COLUMNS: &str = "id, owner_id, applicant_full_name, applicant_nationality, \
     applicant_birth_date, notes, status, confidence_score, risk_level, \
     recommendation_summary, priority_score, sla_due_at, queued_at, \
     final_decision, final_decision_reason, final_decision_by_id, \
     final_decision_at, created_at, updated_at";
