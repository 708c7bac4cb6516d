//! Integration test harness.
//!
//! Tests run against a dedicated `_test` database derived from
//! `DATABASE_URL`. When no database is configured the harness returns
//! None and tests skip, so the suite stays green on machines without
//! Postgres.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware, Router,
};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tower::ServiceExt;
use uuid::Uuid;

use server::advisory::NoGenerator;
use server::config::AppConfig;
use server::db::AppState;
use server::extract::nlp::Dictionaries;
use server::extract::ocr::DisabledOcr;
use server::extract::EvidenceExtractor;
use server::pipeline::WorkerContext;
use server::storage::MemoryStore;
use shared_types::SlaWindows;

/// Tables to truncate before each test run (child tables before parents).
const ALL_TABLES: &str = "application_audit_event, eligibility_rule_result, case_lock, \
     application_document, citizenship_application, users";

/// One-time flag to ensure we only set up the test database once per process.
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Serializes database setup across concurrently starting tests.
static INIT_LOCK: std::sync::LazyLock<tokio::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| tokio::sync::Mutex::new(()));

/// The processing queue is global FIFO state: tests that enqueue or execute
/// jobs hold this guard so they do not pick up each other's cases.
pub static QUEUE_GUARD: std::sync::LazyLock<tokio::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| tokio::sync::Mutex::new(()));

fn test_app_config() -> AppConfig {
    AppConfig {
        secret_key: "integration-test-secret".to_string(),
        access_token_ttl_minutes: 60,
        max_upload_bytes: 1024 * 1024,
        allowed_content_types: shared_types::ALLOWED_CONTENT_TYPES
            .iter()
            .map(|t| t.to_string())
            .collect(),
        upload_root: std::env::temp_dir()
            .join("medborger-int-uploads")
            .to_string_lossy()
            .into_owned(),
        worker_pool_size: 1,
        stale_lock_ttl_seconds: 600,
        extractor_timeout_seconds: 5,
        daily_manual_capacity: 20,
        high_priority_threshold: 70.0,
        sla_windows: SlaWindows::default(),
        ocr_enabled: false,
        nlp_model_path: None,
        advisory_base_url: None,
        advisory_api_key: None,
        advisory_model: "advisory-default".to_string(),
        advisory_timeout_seconds: 1,
        advisory_temperature: 0.0,
    }
}

/// Set up the test database and point DATABASE_URL at it so all pool
/// creation uses the `_test` database instead of the main one.
async fn ensure_test_db() -> Option<()> {
    let _ = dotenvy::dotenv();
    let original_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("DB_URL"))
        .ok()?;

    let (base_url, db_name) = original_url.rsplit_once('/')?;
    let test_db_name = if db_name.ends_with("_test") {
        db_name.to_string()
    } else {
        format!("{db_name}_test")
    };
    let test_url = format!("{base_url}/{test_db_name}");

    let admin_url = format!("{base_url}/postgres");
    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&admin_url)
        .await
        .ok()?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&test_db_name)
            .fetch_one(&admin_pool)
            .await
            .ok()?;

    if !exists {
        sqlx::query(&format!("CREATE DATABASE \"{test_db_name}\""))
            .execute(&admin_pool)
            .await
            .ok()?;
    }

    admin_pool.close().await;

    std::env::set_var("DATABASE_URL", &test_url);
    Some(())
}

async fn test_pool() -> Option<Pool<Postgres>> {
    let _guard = INIT_LOCK.lock().await;

    if INITIALIZED.get().is_none() {
        ensure_test_db().await?;
    }

    let pool = server::db::create_pool();

    if INITIALIZED.set(()).is_ok() {
        server::db::run_migrations(&pool).await;
        sqlx::query(&format!("TRUNCATE {ALL_TABLES} CASCADE"))
            .execute(&pool)
            .await
            .expect("Failed to truncate test tables");
    }

    Some(pool)
}

/// Full in-process application: router, state, and a worker context for
/// running pipeline jobs deterministically inside tests.
pub struct TestApp {
    pub app: Router,
    pub pool: Pool<Postgres>,
    pub ctx: WorkerContext,
    // Keeps the shutdown channel alive for the context's lifetime.
    pub shutdown_tx: watch::Sender<bool>,
}

/// Build the test application, or None when no database is configured.
#[allow(dead_code)]
pub async fn try_test_app() -> Option<TestApp> {
    server::config::init_with(test_app_config());
    let pool = test_pool().await?;

    let store = Arc::new(MemoryStore::new());
    let ocr = Arc::new(DisabledOcr);
    let extractor = Arc::new(EvidenceExtractor::new(
        ocr.clone(),
        Dictionaries::default(),
        Duration::from_secs(5),
    ));
    let jobs = Arc::new(Notify::new());

    let state = AppState {
        pool: pool.clone(),
        store: store.clone(),
        ocr,
        advisory: Arc::new(NoGenerator),
        jobs,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ctx = WorkerContext {
        pool: pool.clone(),
        store,
        extractor,
        holder_id: Uuid::new_v4(),
        shutdown: shutdown_rx,
    };

    let app = server::rest::api_router()
        .route("/health", axum::routing::get(server::health::health_check))
        .layer(middleware::from_fn(server::auth::middleware::auth_middleware))
        .with_state(state);

    Some(TestApp {
        app,
        pool,
        ctx,
        shutdown_tx,
    })
}

/// Run pipeline jobs until the case reaches the expected status. Earlier
/// tests may leave cases on the queue ahead of ours; those are worked off
/// first.
#[allow(dead_code)]
pub async fn process_until_status(
    harness: &TestApp,
    case_id: Uuid,
    expected: shared_types::CaseStatus,
) {
    for _ in 0..50 {
        let case = server::repo::case::find_by_id(&harness.pool, case_id)
            .await
            .expect("case lookup failed")
            .expect("case vanished");
        if case.case_status() == expected {
            return;
        }
        server::pipeline::process_next(&harness.ctx)
            .await
            .expect("pipeline iteration failed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("case {case_id} never reached {expected:?}");
}

// ── Request helpers ─────────────────────────────────────────────────

#[allow(dead_code)]
pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

#[allow(dead_code)]
pub async fn post_json(
    app: &Router,
    uri: &str,
    json: &Value,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::from(json.to_string())).unwrap()).await
}

#[allow(dead_code)]
pub async fn patch_json(
    app: &Router,
    uri: &str,
    json: &Value,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::from(json.to_string())).unwrap()).await
}

/// Upload a document as multipart form data.
#[allow(dead_code)]
pub async fn upload_document(
    app: &Router,
    application_id: &str,
    document_type: &str,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
    token: &str,
) -> (StatusCode, Value) {
    let boundary = "medborger-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"document_type\"\r\n\r\n\
             {document_type}\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/applications/{application_id}/documents"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

// ── Account helpers ─────────────────────────────────────────────────

/// Sign up a fresh user and return (user_id, bearer token).
#[allow(dead_code)]
pub async fn register_user(app: &Router, email: &str) -> (String, String) {
    let (status, body) = post_json(
        app,
        "/api/v1/users/signup",
        &serde_json::json!({
            "email": email,
            "password": "test-password-123",
            "full_name": "Test User",
        }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    let user_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        app,
        "/api/v1/login",
        &serde_json::json!({ "email": email, "password": "test-password-123" }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    (user_id, body["access_token"].as_str().unwrap().to_string())
}

/// Sign up a user, grant the reviewer role, and return a token carrying it.
#[allow(dead_code)]
pub async fn register_reviewer(app: &Router, pool: &Pool<Postgres>, email: &str) -> String {
    let (_, _) = register_user(app, email).await;
    sqlx::query("UPDATE users SET is_reviewer = TRUE WHERE email = $1")
        .bind(email.to_lowercase())
        .execute(pool)
        .await
        .expect("failed to grant reviewer role");

    // Log in again so the token carries the reviewer claim.
    let (status, body) = post_json(
        app,
        "/api/v1/login",
        &serde_json::json!({ "email": email, "password": "test-password-123" }),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

/// Unique email per test run.
#[allow(dead_code)]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}
