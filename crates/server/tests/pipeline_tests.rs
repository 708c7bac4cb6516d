//! Orchestrator-level tests: locking, recovery, reprocessing, shutdown.
//!
//! Require a PostgreSQL database (DATABASE_URL); skip silently otherwise.

mod common;

use axum::http::StatusCode;
use common::{post_json, register_user, try_test_app, unique_email, upload_document};
use serde_json::json;
use server::extract::pdf::build_test_pdf;
use server::repo;
use shared_types::CaseStatus;
use uuid::Uuid;

macro_rules! require_db {
    () => {
        match try_test_app().await {
            Some(app) => app,
            None => {
                eprintln!("skipping: DATABASE_URL not set");
                return;
            }
        }
    };
}

/// Create a case with one processed-ready passport document and queue it.
async fn queued_case(harness: &common::TestApp, prefix: &str) -> (String, String) {
    let (_, token) = register_user(&harness.app, &unique_email(prefix)).await;
    let (_, case) = post_json(
        &harness.app,
        "/api/v1/applications",
        &json!({ "applicant_full_name": "Ola Nordmann", "applicant_nationality": "Danish" }),
        Some(&token),
    )
    .await;
    let id = case["id"].as_str().unwrap().to_string();
    let pdf = build_test_pdf("Passport NO9999999");
    upload_document(&harness.app, &id, "passport", "p.pdf", "application/pdf", &pdf, &token).await;
    let (status, _) = post_json(
        &harness.app,
        &format!("/api/v1/applications/{id}/process"),
        &json!({}),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (id, token)
}

#[tokio::test]
async fn contended_lock_blocks_processing_and_force_reprocess() {
    let harness = require_db!();
    let _queue = common::QUEUE_GUARD.lock().await;
    let (id, token) = queued_case(&harness, "contend").await;
    let case_id: Uuid = id.parse().unwrap();

    // Simulate another worker mid-job: it holds the lock and the case is
    // Processing.
    let other_worker = Uuid::new_v4();
    assert!(repo::lock::acquire(&harness.pool, case_id, other_worker)
        .await
        .unwrap());
    repo::case::transition(
        &harness.pool,
        case_id,
        Some(CaseStatus::Queued),
        CaseStatus::Processing,
    )
    .await
    .unwrap();

    // A second acquire must fail: at most one holder per case.
    assert!(!repo::lock::acquire(&harness.pool, case_id, Uuid::new_v4())
        .await
        .unwrap());

    // Plain re-queue during processing conflicts.
    let (status, body) = post_json(
        &harness.app,
        &format!("/api/v1/applications/{id}/process"),
        &json!({ "force_reprocess": false }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["kind"], "AlreadyProcessing");

    // Even forced, while the lock is live.
    let (status, body) = post_json(
        &harness.app,
        &format!("/api/v1/applications/{id}/process"),
        &json!({ "force_reprocess": true }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    // Once the lock is gone (crashed worker cleaned up), force recovers.
    repo::lock::release(&harness.pool, case_id, other_worker)
        .await
        .unwrap();
    let (status, body) = post_json(
        &harness.app,
        &format!("/api/v1/applications/{id}/process"),
        &json!({ "force_reprocess": true }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "queued");
}

#[tokio::test]
async fn stale_lock_is_reclaimed_and_case_requeued() {
    let harness = require_db!();
    let _queue = common::QUEUE_GUARD.lock().await;
    let (id, _token) = queued_case(&harness, "stale").await;
    let case_id: Uuid = id.parse().unwrap();

    let dead_worker = Uuid::new_v4();
    assert!(repo::lock::acquire(&harness.pool, case_id, dead_worker)
        .await
        .unwrap());
    repo::case::transition(
        &harness.pool,
        case_id,
        Some(CaseStatus::Queued),
        CaseStatus::Processing,
    )
    .await
    .unwrap();

    // Age the lock past the TTL.
    sqlx::query("UPDATE case_lock SET acquired_at = NOW() - INTERVAL '1 hour' WHERE case_id = $1")
        .bind(case_id)
        .execute(&harness.pool)
        .await
        .unwrap();

    let reclaimed = server::pipeline::reclaim_stale(&harness.pool, 600)
        .await
        .unwrap();
    assert!(reclaimed >= 1);

    assert!(!repo::lock::is_locked(&harness.pool, case_id).await.unwrap());
    let case = repo::case::find_by_id(&harness.pool, case_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case.case_status(), CaseStatus::Queued);

    let events = repo::audit::list_by_case(&harness.pool, case_id).await.unwrap();
    assert!(events.iter().any(|e| e.action == "processing_recovered"));

    // Fresh locks survive reclamation.
    let live_worker = Uuid::new_v4();
    assert!(repo::lock::acquire(&harness.pool, case_id, live_worker)
        .await
        .unwrap());
    server::pipeline::reclaim_stale(&harness.pool, 600).await.unwrap();
    assert!(repo::lock::is_locked(&harness.pool, case_id).await.unwrap());
    repo::lock::release(&harness.pool, case_id, live_worker)
        .await
        .unwrap();
}

#[tokio::test]
async fn force_reprocess_resets_documents_and_reruns_rules() {
    let harness = require_db!();
    let _queue = common::QUEUE_GUARD.lock().await;
    let (id, token) = queued_case(&harness, "force").await;
    let case_id: Uuid = id.parse().unwrap();

    common::process_until_status(&harness, case_id, CaseStatus::ReviewReady).await;
    let first = repo::case::find_by_id(&harness.pool, case_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.case_status(), CaseStatus::ReviewReady);
    let first_sla = first.sla_due_at.expect("sla set on first completion");

    // Reprocess from ReviewReady.
    let (status, _) = post_json(
        &harness.app,
        &format!("/api/v1/applications/{id}/process"),
        &json!({ "force_reprocess": true }),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Documents were reset to uploaded for the forced run.
    let docs = repo::document::list_by_case(&harness.pool, case_id)
        .await
        .unwrap();
    assert!(docs.iter().all(|d| d.status == "uploaded"));

    common::process_until_status(&harness, case_id, CaseStatus::ReviewReady).await;
    let second = repo::case::find_by_id(&harness.pool, case_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.case_status(), CaseStatus::ReviewReady);

    // Determinism: identical inputs give identical derived fields, and the
    // SLA deadline from the first completion is retained.
    assert_eq!(second.confidence_score, first.confidence_score);
    assert_eq!(second.risk_level, first.risk_level);
    assert_eq!(second.recommendation_summary, first.recommendation_summary);
    assert_eq!(second.sla_due_at, Some(first_sla));

    // Exactly one processing_started per execution.
    let events = repo::audit::list_by_case(&harness.pool, case_id).await.unwrap();
    let started = events.iter().filter(|e| e.action == "processing_started").count();
    assert_eq!(started, 2);

    // Rule results were replaced, not appended.
    let rules = repo::rule_result::list_by_case(&harness.pool, case_id)
        .await
        .unwrap();
    assert_eq!(rules.len(), 7);
}

#[tokio::test]
async fn shutdown_rolls_back_to_documents_uploaded() {
    let harness = require_db!();
    let _queue = common::QUEUE_GUARD.lock().await;
    let (id, _token) = queued_case(&harness, "cancel").await;
    let case_id: Uuid = id.parse().unwrap();

    // Signal shutdown before the worker picks the job up: the job starts,
    // observes cancellation, and rolls back.
    harness.shutdown_tx.send(true).unwrap();
    common::process_until_status(&harness, case_id, CaseStatus::DocumentsUploaded).await;

    let case = repo::case::find_by_id(&harness.pool, case_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case.case_status(), CaseStatus::DocumentsUploaded);

    let events = repo::audit::list_by_case(&harness.pool, case_id).await.unwrap();
    assert!(events.iter().any(|e| e.action == "processing_cancelled"));

    // No lock is left behind.
    assert!(!repo::lock::is_locked(&harness.pool, case_id).await.unwrap());
}

#[tokio::test]
async fn per_document_failure_does_not_abort_the_job() {
    let harness = require_db!();
    let _queue = common::QUEUE_GUARD.lock().await;
    let (_, token) = register_user(&harness.app, &unique_email("docfail")).await;
    let (_, case) = post_json(
        &harness.app,
        "/api/v1/applications",
        &json!({ "applicant_full_name": "Kari Hansen", "applicant_nationality": "Finnish" }),
        Some(&token),
    )
    .await;
    let id = case["id"].as_str().unwrap().to_string();
    let case_id: Uuid = id.parse().unwrap();

    let pdf = build_test_pdf("Passport NO4444444");
    upload_document(&harness.app, &id, "passport", "ok.pdf", "application/pdf", &pdf, &token).await;
    upload_document(
        &harness.app,
        &id,
        "residence_proof",
        "broken.pdf",
        "application/pdf",
        &build_test_pdf("botid 5 år i Norge"),
        &token,
    )
    .await;

    // Corrupt one document's storage handle so its bytes cannot be read.
    let docs = repo::document::list_by_case(&harness.pool, case_id)
        .await
        .unwrap();
    let broken = docs
        .iter()
        .find(|d| d.original_filename == "broken.pdf")
        .unwrap();
    sqlx::query("UPDATE application_document SET storage_key = 'missing/void' WHERE id = $1")
        .bind(broken.id)
        .execute(&harness.pool)
        .await
        .unwrap();

    post_json(
        &harness.app,
        &format!("/api/v1/applications/{id}/process"),
        &json!({}),
        Some(&token),
    )
    .await;
    common::process_until_status(&harness, case_id, CaseStatus::ReviewReady).await;

    // The job completed; the broken document failed, the other processed.
    let case = repo::case::find_by_id(&harness.pool, case_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case.case_status(), CaseStatus::ReviewReady);

    let docs = repo::document::list_by_case(&harness.pool, case_id)
        .await
        .unwrap();
    let broken = docs
        .iter()
        .find(|d| d.original_filename == "broken.pdf")
        .unwrap();
    let ok = docs.iter().find(|d| d.original_filename == "ok.pdf").unwrap();
    assert_eq!(broken.status, "failed");
    assert!(broken.processing_error.is_some());
    assert_eq!(ok.status, "processed");

    // Rules still ran over the full set.
    let rules = repo::rule_result::list_by_case(&harness.pool, case_id)
        .await
        .unwrap();
    assert_eq!(rules.len(), 7);
}
