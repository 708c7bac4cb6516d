//! Per-case processing pipeline.
//!
//! `queue_processing` validates preconditions and places a case on the
//! FIFO queue; workers ([`worker`]) pick queued cases, hold the per-case
//! lock for the whole run, extract evidence from pending documents,
//! evaluate the rule engine, and atomically publish results.

pub mod worker;

use chrono::Utc;
use serde_json::json;
use shared_types::{actions, AppError, AppErrorKind, Case, CaseStatus, DocumentStatus};
use sqlx::{Pool, Postgres};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::extract::EvidenceExtractor;
use crate::repo;
use crate::rules::{self, DocumentInput, RuleInput};
use crate::storage::DocumentStore;

/// Everything a worker needs to execute jobs.
#[derive(Clone)]
pub struct WorkerContext {
    pub pool: Pool<Postgres>,
    pub store: Arc<dyn DocumentStore>,
    pub extractor: Arc<EvidenceExtractor>,
    /// Identifies this worker in the lock table.
    pub holder_id: Uuid,
    pub shutdown: watch::Receiver<bool>,
}

impl WorkerContext {
    pub fn cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Completed,
    Cancelled,
}

// ── Enqueue ─────────────────────────────────────────────────────────

/// Queue a case for processing.
///
/// Permitted from DocumentsUploaded, ReviewReady and MoreInfoRequired when
/// at least one document exists; from Processing only with
/// `force_reprocess` and no live lock (crash recovery). Re-queueing an
/// already queued case is a no-op.
#[tracing::instrument(skip(pool))]
pub async fn queue_processing(
    pool: &Pool<Postgres>,
    case_id: Uuid,
    actor: Uuid,
    force_reprocess: bool,
) -> Result<Case, AppError> {
    let case = repo::case::find_by_id(pool, case_id)
        .await?
        .ok_or_else(|| AppError::not_found("Application not found"))?;
    let status = case.case_status();

    // Idempotent: a queued case stays queued, once.
    if status == CaseStatus::Queued {
        return Ok(case);
    }

    let document_count = repo::document::count_by_case(pool, case_id).await?;
    if document_count == 0 {
        return Err(AppError::no_documents(
            "Upload at least one document before processing",
        ));
    }

    match status {
        CaseStatus::DocumentsUploaded
        | CaseStatus::ReviewReady
        | CaseStatus::MoreInfoRequired => {}
        CaseStatus::Processing => {
            if !force_reprocess {
                return Err(AppError::already_processing(
                    "Application is already being processed",
                ));
            }
            if repo::lock::is_locked(pool, case_id).await? {
                return Err(AppError::already_processing(
                    "A worker currently holds this application",
                ));
            }
        }
        other => {
            return Err(AppError::invalid_transition(format!(
                "cannot queue an application in status {other}"
            )));
        }
    }

    if force_reprocess {
        repo::document::reset_for_reprocess(pool, case_id).await?;
    }

    let (case, newly_queued) = repo::case::mark_queued(pool, case_id).await?;
    if newly_queued {
        repo::audit::append(
            pool,
            case_id,
            actions::PROCESSING_QUEUED,
            Some(actor),
            Some("Automated pre-screening queued"),
            json!({ "force_reprocess": force_reprocess }),
        )
        .await?;
    }

    Ok(case)
}

// ── Execution ───────────────────────────────────────────────────────

/// Pick and execute the oldest queued case, if any. Returns true when a
/// job ran (even unsuccessfully) so the caller can immediately poll again.
pub async fn process_next(ctx: &WorkerContext) -> Result<bool, AppError> {
    let Some(case) = repo::queue::next_queued(&ctx.pool).await? else {
        return Ok(false);
    };

    if !repo::lock::acquire(&ctx.pool, case.id, ctx.holder_id).await? {
        // Another worker owns this case; nothing for us right now.
        return Ok(false);
    }

    let case = match repo::case::transition(
        &ctx.pool,
        case.id,
        Some(CaseStatus::Queued),
        CaseStatus::Processing,
    )
    .await
    {
        Ok(case) => case,
        Err(err) => {
            // The case moved while we acquired the lock; drop it.
            repo::lock::release(&ctx.pool, case.id, ctx.holder_id).await?;
            if err.kind == AppErrorKind::InvalidTransition {
                return Ok(true);
            }
            return Err(err);
        }
    };

    repo::audit::append(
        &ctx.pool,
        case.id,
        actions::PROCESSING_STARTED,
        None,
        Some("Automated pre-screening started"),
        json!({ "worker": ctx.holder_id }),
    )
    .await?;

    let result = run_job(ctx, &case).await;
    repo::lock::release(&ctx.pool, case.id, ctx.holder_id).await?;

    if let Err(err) = result {
        fail_job(ctx, case.id, &err).await;
    }

    Ok(true)
}

/// Execute the processing job for a case the caller has locked and marked
/// Processing. Per-document failures degrade; job-level errors bubble up.
async fn run_job(ctx: &WorkerContext, case: &Case) -> Result<JobOutcome, AppError> {
    let documents = repo::document::list_by_case(&ctx.pool, case.id).await?;

    let mut processed = 0usize;
    let mut failed = 0usize;

    for document in &documents {
        let status = document.document_status();
        if status != DocumentStatus::Uploaded && status != DocumentStatus::Failed {
            continue;
        }

        if ctx.cancelled() {
            return cancel_job(ctx, case).await;
        }

        repo::document::set_status(&ctx.pool, document.id, DocumentStatus::Processing, None)
            .await?;

        let bytes = match ctx.store.get(&document.storage_key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(document_id = %document.id, "stored bytes unreadable: {e}");
                repo::document::set_status(
                    &ctx.pool,
                    document.id,
                    DocumentStatus::Failed,
                    Some(&truncate_reason(&format!("stored file unreadable: {e}"))),
                )
                .await?;
                failed += 1;
                continue;
            }
        };

        match ctx
            .extractor
            .extract(&document.content_type, &bytes, &document.document_type)
            .await
        {
            Ok(record) => {
                repo::document::store_extraction(
                    &ctx.pool,
                    document.id,
                    &record.extracted_text,
                    &record.extracted_fields.to_value(),
                )
                .await?;
                processed += 1;
            }
            Err(err) => {
                repo::document::set_status(
                    &ctx.pool,
                    document.id,
                    DocumentStatus::Failed,
                    Some(&truncate_reason(&err.message)),
                )
                .await?;
                failed += 1;
            }
        }
    }

    if ctx.cancelled() {
        return cancel_job(ctx, case).await;
    }

    // Evaluate rules over the full (refreshed) document set.
    let documents = repo::document::list_by_case(&ctx.pool, case.id).await?;
    let input = RuleInput {
        notes: case.notes.clone().unwrap_or_default(),
        documents: documents
            .iter()
            .map(|d| DocumentInput {
                document_type: d.normalized_type(),
                status: d.document_status(),
                fields: d.fields(),
            })
            .collect(),
    };

    let evaluation = catch_unwind(AssertUnwindSafe(|| rules::evaluate(&input)))
        .map_err(|_| AppError::rule_engine("rule evaluation panicked"))?;

    let now = Utc::now();
    let config = crate::config::get();
    let queued_at = case.queued_at.unwrap_or(now);
    // First entry to ReviewReady sets the SLA deadline; reprocessing keeps
    // the original one.
    let sla_due_at = case
        .sla_due_at
        .or_else(|| Some(config.sla_windows.due_at(queued_at, evaluation.risk_level)));
    let priority = shared_types::priority_score(
        Some(evaluation.confidence_score),
        case.queued_at,
        sla_due_at,
        now,
    );

    repo::rule_result::replace(&ctx.pool, case.id, &evaluation, priority, sla_due_at).await?;

    repo::case::transition(
        &ctx.pool,
        case.id,
        Some(CaseStatus::Processing),
        CaseStatus::ReviewReady,
    )
    .await?;

    repo::audit::append(
        &ctx.pool,
        case.id,
        actions::PROCESSING_COMPLETED,
        None,
        Some("Automated pre-screening completed"),
        json!({
            "confidence_score": evaluation.confidence_score,
            "risk_level": evaluation.risk_level.as_str(),
            "priority_score": priority,
            "processed_documents": processed,
            "failed_documents": failed,
        }),
    )
    .await?;

    Ok(JobOutcome::Completed)
}

/// Shutdown arrived mid-job: finish nothing further, roll the case back to
/// DocumentsUploaded so a later run starts clean.
async fn cancel_job(ctx: &WorkerContext, case: &Case) -> Result<JobOutcome, AppError> {
    repo::case::transition(
        &ctx.pool,
        case.id,
        Some(CaseStatus::Processing),
        CaseStatus::DocumentsUploaded,
    )
    .await?;
    repo::audit::append(
        &ctx.pool,
        case.id,
        actions::PROCESSING_CANCELLED,
        None,
        Some("Processing cancelled by shutdown"),
        json!({ "worker": ctx.holder_id }),
    )
    .await?;
    Ok(JobOutcome::Cancelled)
}

/// Job-level failure: the case returns to DocumentsUploaded and the error
/// class lands on the audit trail. Rule results are left untouched.
async fn fail_job(ctx: &WorkerContext, case_id: Uuid, err: &AppError) {
    tracing::error!(case_id = %case_id, error = %err, "processing job failed");

    if let Err(rollback_err) = repo::case::transition(
        &ctx.pool,
        case_id,
        Some(CaseStatus::Processing),
        CaseStatus::DocumentsUploaded,
    )
    .await
    {
        tracing::error!(case_id = %case_id, error = %rollback_err, "rollback failed");
    }

    let _ = repo::audit::append(
        &ctx.pool,
        case_id,
        actions::PROCESSING_FAILED,
        None,
        Some(&err.message),
        json!({ "error_class": err.kind.to_string() }),
    )
    .await;
}

// ── Stale lock reclamation ──────────────────────────────────────────

/// Reclaim locks abandoned by crashed workers: remove the lock and put a
/// stuck Processing case back on the queue.
pub async fn reclaim_stale(pool: &Pool<Postgres>, ttl_seconds: i64) -> Result<usize, AppError> {
    let stale = repo::lock::find_stale(pool, ttl_seconds).await?;
    let mut reclaimed = 0;

    for lock in stale {
        tracing::warn!(
            case_id = %lock.case_id,
            holder = %lock.holder_id,
            acquired_at = %lock.acquired_at,
            "reclaiming stale processing lock"
        );
        repo::lock::remove(pool, lock.case_id, lock.holder_id).await?;

        let Some(case) = repo::case::find_by_id(pool, lock.case_id).await? else {
            continue;
        };
        if case.case_status() == CaseStatus::Processing {
            repo::case::transition(
                pool,
                lock.case_id,
                Some(CaseStatus::Processing),
                CaseStatus::Queued,
            )
            .await?;
            repo::audit::append(
                pool,
                lock.case_id,
                actions::PROCESSING_RECOVERED,
                None,
                Some("Stale processing lock reclaimed"),
                json!({ "previous_holder": lock.holder_id }),
            )
            .await?;
        }
        reclaimed += 1;
    }

    Ok(reclaimed)
}

fn truncate_reason(reason: &str) -> String {
    const MAX: usize = 512;
    if reason.len() <= MAX {
        reason.to_string()
    } else {
        reason.chars().take(MAX).collect()
    }
}
