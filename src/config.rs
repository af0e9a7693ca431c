use std::env;

fn env_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Runtime configuration, loaded once from the environment at startup.
///
/// Mirrors `app/core/config.py` in the original backend: every knob is a
/// plain field with a sane default, overridable via env var.
#[derive(Debug, Clone)]
pub struct Config {
    pub env: String,
    pub database_url: String,

    pub jwt_secret: String,
    pub jwt_access_minutes: i64,
    pub jwt_refresh_days: i64,

    pub otp_ttl_minutes: i64,
    pub otp_pepper: String,
    pub otp_request_cooldown_seconds: i64,

    pub confirm_window_hours: i64,
    pub provisional_matches: i32,
    pub provisional_cap: i32,
    pub max_score_proposals: i32,

    pub db_pool_size: u32,
    pub api_workers: u32,
    pub api_host: String,
    pub api_port: u16,
    pub allowed_hosts: Vec<String>,
    pub security_headers_enabled: bool,
    pub cors_allowed_origins: Vec<String>,

    pub billing_provider: String,
    pub billing_webhook_secret: Option<String>,
    pub billing_require_webhook_signature: bool,
    pub billing_webhook_max_age_seconds: i64,
    pub billing_webhook_stripe_secret: Option<String>,
    pub billing_webhook_app_store_secret: Option<String>,
    pub billing_webhook_google_play_secret: Option<String>,
    pub billing_plus_plan_code: String,

    pub app_store_shared_secret: Option<String>,
    pub app_store_verify_url_prod: String,
    pub app_store_verify_url_sandbox: String,

    pub google_play_package_name: Option<String>,
    pub google_play_service_account_email: Option<String>,
    pub google_play_service_account_private_key_pem: Option<String>,
    pub google_play_token_uri: String,
    pub google_play_android_publisher_scope: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            env: env_str("ENV", "prod"),
            database_url: env_str("DATABASE_URL", ""),

            jwt_secret: env_str("JWT_SECRET", "CHANGE_ME"),
            jwt_access_minutes: env_i64("JWT_ACCESS_MINUTES", 60),
            jwt_refresh_days: env_i64("JWT_REFRESH_DAYS", 30),

            otp_ttl_minutes: env_i64("OTP_TTL_MINUTES", 10),
            otp_pepper: env_str("OTP_PEPPER", "CHANGE_ME"),
            otp_request_cooldown_seconds: env_i64("OTP_REQUEST_COOLDOWN_SECONDS", 120),

            confirm_window_hours: env_i64("CONFIRM_WINDOW_HOURS", 48),
            provisional_matches: env_u32("PROVISIONAL_MATCHES", 5) as i32,
            provisional_cap: env_u32("PROVISIONAL_CAP", 30) as i32,
            max_score_proposals: env_u32("MAX_SCORE_PROPOSALS", 2) as i32,

            db_pool_size: env_u32("DB_POOL_SIZE", 5),
            api_workers: env_u32("API_WORKERS", 2),
            api_host: env_str("API_HOST", "0.0.0.0"),
            api_port: env_u32("API_PORT", 8080) as u16,
            allowed_hosts: env_str("ALLOWED_HOSTS", "localhost,127.0.0.1")
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            security_headers_enabled: env_bool("SECURITY_HEADERS_ENABLED", true),
            cors_allowed_origins: env_str("CORS_ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            billing_provider: env_str("BILLING_PROVIDER", "none"),
            billing_webhook_secret: env_opt("BILLING_WEBHOOK_SECRET"),
            billing_require_webhook_signature: env_bool("BILLING_REQUIRE_WEBHOOK_SIGNATURE", false),
            billing_webhook_max_age_seconds: env_i64("BILLING_WEBHOOK_MAX_AGE_SECONDS", 300),
            billing_webhook_stripe_secret: env_opt("BILLING_WEBHOOK_STRIPE_SECRET"),
            billing_webhook_app_store_secret: env_opt("BILLING_WEBHOOK_APP_STORE_SECRET"),
            billing_webhook_google_play_secret: env_opt("BILLING_WEBHOOK_GOOGLE_PLAY_SECRET"),
            billing_plus_plan_code: env_str("BILLING_PLUS_PLAN_CODE", "RIVIO_PLUS"),

            app_store_shared_secret: env_opt("APP_STORE_SHARED_SECRET"),
            app_store_verify_url_prod: env_str(
                "APP_STORE_VERIFY_URL_PROD",
                "https://buy.itunes.apple.com/verifyReceipt",
            ),
            app_store_verify_url_sandbox: env_str(
                "APP_STORE_VERIFY_URL_SANDBOX",
                "https://sandbox.itunes.apple.com/verifyReceipt",
            ),

            google_play_package_name: env_opt("GOOGLE_PLAY_PACKAGE_NAME"),
            google_play_service_account_email: env_opt("GOOGLE_PLAY_SERVICE_ACCOUNT_EMAIL"),
            google_play_service_account_private_key_pem: env_opt(
                "GOOGLE_PLAY_SERVICE_ACCOUNT_PRIVATE_KEY_PEM",
            ),
            google_play_token_uri: env_str(
                "GOOGLE_PLAY_TOKEN_URI",
                "https://oauth2.googleapis.com/token",
            ),
            google_play_android_publisher_scope: env_str(
                "GOOGLE_PLAY_ANDROID_PUBLISHER_SCOPE",
                "https://www.googleapis.com/auth/androidpublisher",
            ),
        }
    }

    pub fn is_dev(&self) -> bool {
        self.env == "dev"
    }
}
