use shared_types::SlaWindows;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Server configuration, read from the environment once at startup.
///
/// Every knob has a documented default so a bare `.env` with `SECRET_KEY`
/// and `DATABASE_URL` is enough to run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HS256 signing key for bearer tokens.
    pub secret_key: String,
    /// Access token lifetime in minutes (default 8 days).
    pub access_token_ttl_minutes: i64,
    /// Upload size ceiling in bytes (default 25 MiB).
    pub max_upload_bytes: usize,
    /// Accepted upload content types (comma-separated env override).
    pub allowed_content_types: Vec<String>,
    /// Root directory for stored document bytes.
    pub upload_root: String,
    /// Number of processing workers.
    pub worker_pool_size: usize,
    /// Age after which a processing lock is considered abandoned.
    pub stale_lock_ttl_seconds: i64,
    /// Per-document extractor budget.
    pub extractor_timeout_seconds: u64,
    /// Reviewer throughput used for backlog estimates.
    pub daily_manual_capacity: i64,
    /// Priority score at or above which a case counts as high priority.
    pub high_priority_threshold: f64,
    /// Review SLA windows in days by risk level.
    pub sla_windows: SlaWindows,
    /// Whether the image OCR provider is enabled.
    pub ocr_enabled: bool,
    /// Optional dictionary override file for the NLP extractor.
    pub nlp_model_path: Option<String>,
    /// External advisory generator; both must be set to enable it.
    pub advisory_base_url: Option<String>,
    pub advisory_api_key: Option<String>,
    pub advisory_model: String,
    pub advisory_timeout_seconds: u64,
    pub advisory_temperature: f64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Read configuration from the environment. `SECRET_KEY` is the only
    /// hard requirement.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            secret_key: std::env::var("SECRET_KEY").expect("SECRET_KEY must be set"),
            access_token_ttl_minutes: env_parse("ACCESS_TOKEN_TTL_MINUTES", 11_520),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 25 * 1024 * 1024),
            allowed_content_types: std::env::var("ALLOWED_CONTENT_TYPES")
                .map(|csv| {
                    csv.split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    shared_types::ALLOWED_CONTENT_TYPES
                        .iter()
                        .map(|t| t.to_string())
                        .collect()
                }),
            upload_root: std::env::var("UPLOAD_ROOT")
                .unwrap_or_else(|_| "data/uploads".to_string()),
            worker_pool_size: env_parse("WORKER_POOL_SIZE", 4),
            stale_lock_ttl_seconds: env_parse("STALE_LOCK_TTL_SECONDS", 600),
            extractor_timeout_seconds: env_parse("EXTRACTOR_TIMEOUT_SECONDS", 60),
            daily_manual_capacity: env_parse("DAILY_MANUAL_CAPACITY", 20),
            high_priority_threshold: env_parse("HIGH_PRIORITY_THRESHOLD", 70.0),
            sla_windows: SlaWindows {
                low: env_parse("SLA_WINDOW_DAYS_LOW", 21),
                medium: env_parse("SLA_WINDOW_DAYS_MEDIUM", 14),
                high: env_parse("SLA_WINDOW_DAYS_HIGH", 7),
            },
            ocr_enabled: env_parse("OCR_ENABLED", false),
            nlp_model_path: env_opt("NLP_MODEL_PATH"),
            advisory_base_url: env_opt("ADVISORY_BASE_URL"),
            advisory_api_key: env_opt("ADVISORY_API_KEY"),
            advisory_model: std::env::var("ADVISORY_MODEL")
                .unwrap_or_else(|_| "advisory-default".to_string()),
            advisory_timeout_seconds: env_parse("ADVISORY_TIMEOUT_SECONDS", 20),
            advisory_temperature: env_parse("ADVISORY_TEMPERATURE", 0.2),
        }
    }

    /// Whether an external advisory generator is configured.
    pub fn advisory_enabled(&self) -> bool {
        self.advisory_base_url.is_some() && self.advisory_api_key.is_some()
    }
}

/// Get the process-wide configuration, loading it on first use.
pub fn get() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::from_env)
}

/// Install a configuration explicitly (tests). Only the first call wins.
pub fn init_with(config: AppConfig) -> &'static AppConfig {
    let _ = CONFIG.set(config);
    CONFIG.get().expect("config initialized")
}

#[cfg(test)]
pub fn test_config() -> AppConfig {
    AppConfig {
        secret_key: "test-secret-key".to_string(),
        access_token_ttl_minutes: 60,
        max_upload_bytes: 1024 * 1024,
        allowed_content_types: shared_types::ALLOWED_CONTENT_TYPES
            .iter()
            .map(|t| t.to_string())
            .collect(),
        upload_root: std::env::temp_dir()
            .join("medborger-test-uploads")
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
