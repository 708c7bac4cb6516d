use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::case::RiskLevel;

// ── Priority scoring ────────────────────────────────────────────────

const CONFIDENCE_WEIGHT: f64 = 0.55;
const AGE_WEIGHT: f64 = 0.25;
const OVERDUE_WEIGHT: f64 = 0.20;
const AGE_SATURATION_DAYS: f64 = 14.0;

/// How many days a case has waited since it was queued, saturating at the
/// 14-day aging horizon. Missing `queued_at` contributes no age.
pub fn age_factor(queued_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(queued_at) = queued_at else {
        return 0.0;
    };
    let days = (now - queued_at).num_seconds().max(0) as f64 / 86_400.0;
    (days / AGE_SATURATION_DAYS).min(1.0)
}

pub fn is_overdue(sla_due_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(sla_due_at, Some(due) if now > due)
}

/// Reviewer priority in [0, 100]: low confidence dominates, aging and SLA
/// breach push a case up the queue.
pub fn priority_score(
    confidence_score: Option<f64>,
    queued_at: Option<DateTime<Utc>>,
    sla_due_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    let confidence = confidence_score.unwrap_or(0.0).clamp(0.0, 1.0);
    let overdue = if is_overdue(sla_due_at, now) { 1.0 } else { 0.0 };
    let raw = 100.0
        * (CONFIDENCE_WEIGHT * (1.0 - confidence)
            + AGE_WEIGHT * age_factor(queued_at, now)
            + OVERDUE_WEIGHT * overdue);
    raw.round().clamp(0.0, 100.0)
}

// ── SLA windows ─────────────────────────────────────────────────────

/// Review SLA windows in days, by risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaWindows {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

impl Default for SlaWindows {
    fn default() -> Self {
        Self {
            low: 21,
            medium: 14,
            high: 7,
        }
    }
}

impl SlaWindows {
    pub fn window_days(&self, risk: RiskLevel) -> i64 {
        match risk {
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
        }
    }

    /// Deadline for a case queued at `queued_at` with the given risk.
    pub fn due_at(&self, queued_at: DateTime<Utc>, risk: RiskLevel) -> DateTime<Utc> {
        queued_at + Duration::days(self.window_days(risk))
    }
}

/// Days needed to clear the backlog at the configured daily capacity,
/// rounded up. Capacity must be validated > 0 by the caller.
pub fn estimated_days_to_clear_backlog(pending_manual_count: i64, daily_capacity: i64) -> i64 {
    if pending_manual_count <= 0 {
        return 0;
    }
    (pending_manual_count + daily_capacity - 1) / daily_capacity
}

// ── API shapes ──────────────────────────────────────────────────────

/// One entry of the reviewer queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReviewQueueItem {
    pub id: Uuid,
    pub applicant_full_name: String,
    pub applicant_nationality: String,
    pub status: String,
    pub recommendation_summary: Option<String>,
    pub confidence_score: Option<f64>,
    pub risk_level: Option<String>,
    pub priority_score: f64,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReviewQueuePublic {
    pub data: Vec<ReviewQueueItem>,
    pub count: i64,
}

/// Aggregate metrics over the pending-manual queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QueueMetrics {
    pub pending_manual_count: i64,
    pub overdue_count: i64,
    pub high_priority_count: i64,
    pub avg_waiting_days: f64,
    pub daily_manual_capacity: i64,
    pub estimated_days_to_clear_backlog: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn age_factor_saturates_at_fourteen_days() {
        let now = at("2026-01-15T00:00:00Z");
        assert_eq!(age_factor(Some(at("2026-01-15T00:00:00Z")), now), 0.0);
        let half = age_factor(Some(at("2026-01-08T00:00:00Z")), now);
        assert!((half - 0.5).abs() < 1e-9);
        assert_eq!(age_factor(Some(at("2025-12-01T00:00:00Z")), now), 1.0);
        assert_eq!(age_factor(None, now), 0.0);
    }

    #[test]
    fn age_factor_never_negative_for_future_queued_at() {
        let now = at("2026-01-15T00:00:00Z");
        assert_eq!(age_factor(Some(at("2026-01-16T00:00:00Z")), now), 0.0);
    }

    #[test]
    fn priority_for_fresh_low_confidence_case() {
        let now = at("2026-01-15T00:00:00Z");
        // confidence 0.2, no age, not overdue: 100 * 0.55 * 0.8 = 44
        let score = priority_score(Some(0.2), Some(now), Some(now + Duration::days(7)), now);
        assert_eq!(score, 44.0);
    }

    #[test]
    fn priority_maxes_out_for_overdue_aged_zero_confidence() {
        let now = at("2026-01-15T00:00:00Z");
        let queued = now - Duration::days(30);
        let due = now - Duration::days(1);
        assert_eq!(priority_score(Some(0.0), Some(queued), Some(due), now), 100.0);
    }

    #[test]
    fn priority_treats_missing_confidence_as_zero() {
        let now = at("2026-01-15T00:00:00Z");
        assert_eq!(priority_score(None, None, None, now), 55.0);
    }

    #[test]
    fn priority_stays_within_bounds() {
        let now = at("2026-01-15T00:00:00Z");
        for confidence in [-0.5, 0.0, 0.3, 0.7, 1.0, 1.5] {
            let score = priority_score(Some(confidence), Some(now - Duration::days(40)), Some(now - Duration::days(1)), now);
            assert!((0.0..=100.0).contains(&score), "score {score} out of bounds");
        }
    }

    #[test]
    fn overdue_is_strict_comparison() {
        let now = at("2026-01-15T00:00:00Z");
        assert!(!is_overdue(Some(now), now));
        assert!(is_overdue(Some(now - Duration::seconds(1)), now));
        assert!(!is_overdue(None, now));
    }

    #[test]
    fn sla_windows_by_risk() {
        let windows = SlaWindows::default();
        let queued = at("2026-01-01T00:00:00Z");
        assert_eq!(
            windows.due_at(queued, RiskLevel::Low),
            at("2026-01-22T00:00:00Z")
        );
        assert_eq!(
            windows.due_at(queued, RiskLevel::Medium),
            at("2026-01-15T00:00:00Z")
        );
        assert_eq!(
            windows.due_at(queued, RiskLevel::High),
            at("2026-01-08T00:00:00Z")
        );
    }

    #[test]
    fn backlog_estimate_rounds_up() {
        assert_eq!(estimated_days_to_clear_backlog(0, 20), 0);
        assert_eq!(estimated_days_to_clear_backlog(1, 20), 1);
        assert_eq!(estimated_days_to_clear_backlog(20, 20), 1);
        assert_eq!(estimated_days_to_clear_backlog(21, 20), 2);
        assert_eq!(estimated_days_to_clear_backlog(45, 20), 3);
    }
}
