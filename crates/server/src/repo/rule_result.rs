use chrono::{DateTime, Utc};
use shared_types::{AppError, RuleResult};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;
use crate::rules::Evaluation;

const RULE_COLUMNS: &str = "id, application_id, rule_code, rule_name, passed, score, weight, \
     rationale, evidence, evaluated_at";

/// Latest rule results for a case, in catalog order (by evaluation insert
/// order).
pub async fn list_by_case(
    pool: &Pool<Postgres>,
    application_id: Uuid,
) -> Result<Vec<RuleResult>, AppError> {
    let sql = format!(
        "SELECT {RULE_COLUMNS} FROM eligibility_rule_result \
         WHERE application_id = $1 \
         ORDER BY weight DESC, rule_code ASC"
    );
    sqlx::query_as::<_, RuleResult>(&sql)
        .bind(application_id)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Atomically replace a case's rule results and derived fields.
///
/// One transaction: delete previous results, insert the new set, update
/// confidence/risk/recommendation/priority/SLA on the case row. A reader
/// observing ReviewReady afterwards sees exactly this run's output.
pub async fn replace(
    pool: &Pool<Postgres>,
    application_id: Uuid,
    evaluation: &Evaluation,
    priority_score: f64,
    sla_due_at: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;
    let evaluated_at = Utc::now();

    sqlx::query("DELETE FROM eligibility_rule_result WHERE application_id = $1")
        .bind(application_id)
        .execute(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    for rule in &evaluation.rules {
        sqlx::query(
            "INSERT INTO eligibility_rule_result \
                 (id, application_id, rule_code, rule_name, passed, score, \
                  weight, rationale, evidence, evaluated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::new_v4())
        .bind(application_id)
        .bind(rule.rule_code)
        .bind(rule.rule_name)
        .bind(rule.passed)
        .bind(rule.score)
        .bind(rule.weight)
        .bind(&rule.rationale)
        .bind(&rule.evidence)
        .bind(evaluated_at)
        .execute(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    }

    sqlx::query(
        "UPDATE citizenship_application SET \
             confidence_score = $2, \
             risk_level = $3, \
             recommendation_summary = $4, \
             priority_score = $5, \
             sla_due_at = $6, \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(application_id)
    .bind(evaluation.confidence_score)
    .bind(evaluation.risk_level.as_str())
    .bind(&evaluation.recommendation_summary)
    .bind(priority_score)
    .bind(sla_due_at)
    .execute(&mut *tx)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)
}
