use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::get;
use tokio::sync::Notify;

use server::advisory::{AdvisoryGenerator, HttpGenerator, NoGenerator};
use server::db::AppState;
use server::extract::nlp::Dictionaries;
use server::extract::ocr::DisabledOcr;
use server::extract::EvidenceExtractor;
use server::pipeline::worker::WorkerPool;
use server::storage::LocalDiskStore;
use server::{config, db, health, openapi, rest, telemetry};

#[tokio::main]
async fn main() {
    telemetry::init();
    let config = config::get();

    let pool = db::create_pool();
    db::run_migrations(&pool).await;
    health::record_start_time();

    let store = Arc::new(LocalDiskStore::new(&config.upload_root));
    let dictionaries = Dictionaries::from_path_or_default(config.nlp_model_path.as_deref());
    // The concrete OCR engine is deployment-specific; without one wired in,
    // the provider reports unavailability and extraction degrades.
    if config.ocr_enabled {
        tracing::warn!("OCR_ENABLED is set but no engine is bundled; images degrade to warnings");
    }
    let ocr: Arc<dyn server::extract::ocr::OcrEngine> = Arc::new(DisabledOcr);
    let extractor = Arc::new(EvidenceExtractor::new(
        ocr.clone(),
        dictionaries,
        Duration::from_secs(config.extractor_timeout_seconds),
    ));
    let advisory: Arc<dyn AdvisoryGenerator> = match HttpGenerator::from_config(config) {
        Some(generator) => {
            tracing::info!("external advisory generator configured");
            Arc::new(generator)
        }
        None => Arc::new(NoGenerator),
    };
    let jobs = Arc::new(Notify::new());

    let state = AppState {
        pool: pool.clone(),
        store: store.clone(),
        ocr,
        advisory,
        jobs: jobs.clone(),
    };

    let workers = WorkerPool::spawn(
        pool.clone(),
        store,
        extractor,
        jobs,
        config.worker_pool_size,
        config.stale_lock_ttl_seconds,
    );

    let app = rest::api_router()
        .route("/health", get(health::health_check))
        .route("/api/v1/openapi.json", get(openapi::openapi_json))
        .layer(middleware::from_fn(server::auth::middleware::auth_middleware))
        .with_state(state);

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listen address");
    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("shutting down workers");
    workers.shutdown().await;
    pool.close().await;
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
