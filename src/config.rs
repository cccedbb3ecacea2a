use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_CART_TTL_HOURS: i64 = 72;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// One-time password settings for phone login
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OtpConfig {
    /// Lifetime of an issued code in seconds
    #[serde(default = "default_otp_ttl_secs")]
    #[validate(range(min = 30, max = 3600))]
    pub ttl_secs: u64,

    /// Wrong guesses allowed before a code is burned
    #[serde(default = "default_otp_max_attempts")]
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: i32,

    /// Codes a single phone may request per window
    #[serde(default = "default_otp_max_per_window")]
    #[validate(range(min = 1, max = 50))]
    pub max_per_window: u64,

    #[serde(default = "default_otp_window_secs")]
    pub window_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_otp_ttl_secs(),
            max_attempts: default_otp_max_attempts(),
            max_per_window: default_otp_max_per_window(),
            window_secs: default_otp_window_secs(),
        }
    }
}

/// SMS gateway settings. Without `api_url` messages are only logged.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_sms_sender")]
    pub sender: String,
}

/// Transactional email settings. Without `api_url` messages are only logged.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_email_from")]
    pub from: String,
    /// Comma-separated list of back office addresses notified about new orders
    #[serde(default)]
    pub admin_recipients: Option<String>,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            sender: default_sms_sender(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            from: default_email_from(),
            admin_recipients: None,
        }
    }
}

impl EmailConfig {
    pub fn admin_recipients(&self) -> Vec<String> {
        self.admin_recipients
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Hosted payment page settings
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfig {
    /// Base URL of the gateway; card checkout is disabled when unset
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Secret used to verify webhook signatures
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,
    /// Where the gateway sends the customer after paying
    #[serde(default)]
    pub return_url: Option<String>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            webhook_secret: None,
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
            return_url: None,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// Customer session lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    /// Back office session lifetime in seconds
    #[serde(default = "default_staff_jwt_expiration")]
    pub staff_jwt_expiration: u64,

    /// JWT issuer name
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// Mark session cookies `Secure`
    #[serde(default = "default_true_bool")]
    pub cookie_secure: bool,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
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

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Default page size for paginated API responses
    #[serde(default = "default_api_page_size")]
    pub api_default_page_size: u64,

    /// Maximum page size allowed for paginated API responses
    #[serde(default = "default_api_max_page_size")]
    pub api_max_page_size: u64,

    /// Currency code shown with prices and sent to the payment gateway
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Hours an untouched cart stays active
    #[serde(default = "default_cart_ttl_hours")]
    #[validate(range(min = 1, max = 720))]
    pub cart_ttl_hours: i64,

    /// TTL of cached storefront listings
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Offset of the bakery's local time from UTC, used for delivery cutoffs
    #[serde(default)]
    #[validate(custom = "validate_utc_offset")]
    pub business_utc_offset_minutes: i32,

    #[serde(default)]
    #[validate]
    pub otp: OtpConfig,

    #[serde(default)]
    pub sms: SmsConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Creates a new configuration with defaults for every optional setting
    pub fn new(
        database_url: String,
        jwt_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration: default_jwt_expiration(),
            staff_jwt_expiration: default_staff_jwt_expiration(),
            auth_issuer: default_auth_issuer(),
            cookie_secure: default_true_bool(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            max_body_size: default_max_body_size(),
            api_default_page_size: default_api_page_size(),
            api_max_page_size: default_api_max_page_size(),
            currency: default_currency(),
            cart_ttl_hours: default_cart_ttl_hours(),
            cache_ttl_secs: default_cache_ttl_secs(),
            business_utc_offset_minutes: 0,
            otp: OtpConfig::default(),
            sms: SmsConfig::default(),
            email: EmailConfig::default(),
            payment: PaymentConfig::default(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique, secure value."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.is_production() && !self.cookie_secure {
            let mut err = ValidationError::new("cookie_secure_required");
            err.message = Some("Session cookies must be Secure in production".into());
            errors.add("cookie_secure", err);
        }

        if self.api_default_page_size == 0 || self.api_default_page_size > self.api_max_page_size
        {
            let mut err = ValidationError::new("api_default_page_size");
            err.message =
                Some("api_default_page_size must be between 1 and api_max_page_size".into());
            errors.add("api_default_page_size", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true_bool() -> bool {
    true
}

fn default_jwt_expiration() -> u64 {
    30 * 24 * 3600
}

fn default_staff_jwt_expiration() -> u64 {
    12 * 3600
}

fn default_auth_issuer() -> String {
    "cookie-delivery-api".to_string()
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
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

fn default_max_body_size() -> usize {
    2 * 1024 * 1024
}

fn default_api_page_size() -> u64 {
    20
}

fn default_api_max_page_size() -> u64 {
    100
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_cart_ttl_hours() -> i64 {
    DEFAULT_CART_TTL_HOURS
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_otp_ttl_secs() -> u64 {
    300
}

fn default_otp_max_attempts() -> i32 {
    5
}

fn default_otp_max_per_window() -> u64 {
    3
}

fn default_otp_window_secs() -> u64 {
    600
}

fn default_sms_sender() -> String {
    "Cookies".to_string()
}

fn default_email_from() -> String {
    "orders@localhost".to_string()
}

fn default_webhook_tolerance_secs() -> u64 {
    300
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_utc_offset(offset: i32) -> Result<(), ValidationError> {
    if !(-720..=840).contains(&offset) {
        let mut err = ValidationError::new("business_utc_offset_minutes");
        err.message = Some("UTC offset must be between -720 and 840 minutes".into());
        return Err(err);
    }
    Ok(())
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 64 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must be at least 64 characters for adequate security".into());
        return Err(err);
    }

    const DISALLOWED: [&str; 3] = [
        "CHANGE_THIS_SECRET_IN_PRODUCTION",
        "your-secret-key",
        "default-secret-key",
    ];
    if DISALLOWED
        .iter()
        .any(|&bad| trimmed.eq_ignore_ascii_case(bad))
    {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must be overridden with a secure random value".into());
        return Err(err);
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must have at least 10 unique characters for adequate entropy".into());
        return Err(err);
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter.
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!(
        "cookie_delivery_api={level},tower_http=debug,sea_orm=warn,sqlx=warn"
    );
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret deliberately has no default.
    let config = Config::builder()
        .set_default("database_url", "sqlite://cookies.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to a random string of at least 64 characters.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod cors_validation_tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite://cookies.db?mode=memory".into(),
            "k3y_f0r_un1t_t3sts_0nly_Qw9Zx7Lm2Np4Rt6Vb8Yc1Hd3Jf5Gs7Ka9Ue0Io2Pq4".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn non_dev_allows_override_flag() {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn non_dev_with_origins_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://cookies.example.com".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn development_allows_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn production_rejects_insecure_cookies() {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        cfg.cookie_secure = false;
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("cookie_secure"));
    }
}
