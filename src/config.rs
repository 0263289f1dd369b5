use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_KEYS: usize = 10_000;
const DEFAULT_VOUCHER_CODE_PREFIX: &str = "SPA";
const DEFAULT_VOUCHER_VALIDITY_DAYS: i64 = 365;
const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Request timeout for inbound HTTP (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Shared server key used to verify payment gateway callback signatures.
    /// The webhook endpoint answers 502 while this is unset.
    #[serde(default)]
    pub payment_server_key: Option<String>,

    /// Prefix for generated voucher codes (`PREFIX-YEAR-RANDOM`)
    #[serde(default = "default_voucher_code_prefix")]
    #[validate(length(min = 2, max = 8), custom = "validate_code_prefix")]
    pub voucher_code_prefix: String,

    /// Voucher validity window in days, counted from issuance
    #[serde(default = "default_voucher_validity_days")]
    #[validate(range(min = 1, max = 3650))]
    pub voucher_validity_days: i64,

    /// Timeout for outbound delivery channel calls (seconds)
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,

    /// Transactional email API endpoint (channel disabled when unset)
    #[serde(default)]
    pub email_api_url: Option<String>,

    /// Transactional email API key
    #[serde(default)]
    pub email_api_key: Option<String>,

    /// Sender address for voucher emails
    #[serde(default)]
    pub email_from: Option<String>,

    /// WhatsApp gateway endpoint (channel disabled when unset)
    #[serde(default)]
    pub whatsapp_api_url: Option<String>,

    /// WhatsApp gateway token
    #[serde(default)]
    pub whatsapp_api_token: Option<String>,

    /// Rate limiting: requests per window
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests_per_window: u32,
    /// Rate limiting: window size (seconds)
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_seconds: u64,
    /// Rate limiting: include X-RateLimit-* headers
    #[serde(default = "default_true_bool")]
    pub rate_limit_enable_headers: bool,
    /// Rate limiting: tracked-key capacity before expired windows are evicted
    #[serde(default = "default_rate_limit_max_keys")]
    pub rate_limit_max_tracked_keys: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_voucher_code_prefix() -> String {
    DEFAULT_VOUCHER_CODE_PREFIX.to_string()
}
fn default_voucher_validity_days() -> i64 {
    DEFAULT_VOUCHER_VALIDITY_DAYS
}
fn default_delivery_timeout_secs() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_SECS
}
fn default_rate_limit_requests() -> u32 {
    DEFAULT_RATE_LIMIT_REQUESTS
}
fn default_rate_limit_window_secs() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}
fn default_rate_limit_max_keys() -> usize {
    DEFAULT_RATE_LIMIT_MAX_KEYS
}
fn default_true_bool() -> bool {
    true
}

fn validate_code_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::new("code_prefix_uppercase_ascii"))
    }
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Loads configuration from `config/default`, `config/{environment}` and
/// `APP__*` environment variables, later sources overriding earlier ones.
pub fn load_config() -> Result<AppConfig, ConfigurationError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let settings = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let cfg: AppConfig = settings.try_deserialize()?;
    cfg.validate()
        .map_err(|e| ConfigurationError::Validation(e.to_string()))?;

    info!(
        environment = %cfg.environment,
        port = cfg.port,
        "configuration loaded"
    );
    Ok(cfg)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
