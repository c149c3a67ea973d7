// sopify-service/src/config.rs
use log::warn;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStoreConfig {
    pub base_url: Option<String>,
    pub token_url: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        OpenAiConfig {
            api_key: None,
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

// Token lifetimes stay well inside what chrono durations can represent
const MAX_ACCESS_TTL_MINUTES: i64 = 60 * 24 * 365;
const MAX_REFRESH_TTL_DAYS: i64 = 365 * 10;

// Process-wide settings, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub database_path: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub cookie_secure: bool,
    pub cors_allowed_origin: String,
    pub bcrypt_cost: u32,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    pub document_store: DocumentStoreConfig,
    pub openai: OpenAiConfig,
    pub external_timeout_secs: u64,
    pub review_sweep_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_address: "127.0.0.1:9090".to_string(),
            database_path: "./storage/sopify.db".to_string(),
            jwt_secret: "sopify_super_secret_key".to_string(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 1,
            cookie_secure: false,
            cors_allowed_origin: "http://localhost:3000".to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            smtp: None,
            mail_from: "SOPify <no-reply@sopify.local>".to_string(),
            document_store: DocumentStoreConfig::default(),
            openai: OpenAiConfig::default(),
            external_timeout_secs: 30,
            review_sweep_interval_secs: 3600,
        }
    }
}

impl AppConfig {
    // Load `.env` if present, then overlay environment variables on the defaults
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = AppConfig::default();

        if env::var("JWT_SECRET").is_err() {
            warn!("⚠️ JWT_SECRET not set, falling back to the development secret");
        }

        let smtp = env_opt("SMTP_HOST").map(|host| SmtpConfig {
            host,
            port: env_parse("SMTP_PORT", 587),
            username: env_opt("SMTP_USERNAME"),
            password: env_opt("SMTP_PASSWORD"),
        });

        AppConfig {
            bind_address: env_or("BIND_ADDRESS", &defaults.bind_address),
            database_path: env_or("DATABASE_PATH", &defaults.database_path),
            jwt_secret: env_or("JWT_SECRET", &defaults.jwt_secret),
            access_token_ttl_minutes: bounded(
                "ACCESS_TOKEN_TTL_MINUTES",
                env_parse("ACCESS_TOKEN_TTL_MINUTES", defaults.access_token_ttl_minutes),
                MAX_ACCESS_TTL_MINUTES,
                defaults.access_token_ttl_minutes,
            ),
            refresh_token_ttl_days: bounded(
                "REFRESH_TOKEN_TTL_DAYS",
                env_parse("REFRESH_TOKEN_TTL_DAYS", defaults.refresh_token_ttl_days),
                MAX_REFRESH_TTL_DAYS,
                defaults.refresh_token_ttl_days,
            ),
            cookie_secure: env_parse("COOKIE_SECURE", defaults.cookie_secure),
            cors_allowed_origin: env_or("CORS_ALLOWED_ORIGIN", &defaults.cors_allowed_origin),
            bcrypt_cost: env_parse("BCRYPT_COST", defaults.bcrypt_cost),
            smtp,
            mail_from: env_or("MAIL_FROM", &defaults.mail_from),
            document_store: DocumentStoreConfig {
                base_url: env_opt("DOCUMENT_STORE_URL"),
                token_url: env_opt("DOCUMENT_STORE_TOKEN_URL"),
                client_id: env_or("DOCUMENT_STORE_CLIENT_ID", ""),
                client_secret: env_or("DOCUMENT_STORE_CLIENT_SECRET", ""),
                redirect_uri: env_or("DOCUMENT_STORE_REDIRECT_URI", ""),
            },
            openai: OpenAiConfig {
                api_key: env_opt("OPENAI_API_KEY"),
                model: env_or("OPENAI_MODEL", &defaults.openai.model),
                base_url: env_or("OPENAI_BASE_URL", &defaults.openai.base_url),
            },
            external_timeout_secs: env_parse("EXTERNAL_TIMEOUT_SECS", defaults.external_timeout_secs),
            review_sweep_interval_secs: env_parse(
                "REVIEW_SWEEP_INTERVAL_SECS",
                defaults.review_sweep_interval_secs,
            ),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env_opt(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("⚠️ Ignoring invalid value for {}: {}", key, raw);
            default
        }),
        None => default,
    }
}

// Keeps `value` within 1..=max, falling back to `default` otherwise
fn bounded(key: &str, value: i64, max: i64, default: i64) -> i64 {
    if (1..=max).contains(&value) {
        value
    } else {
        warn!("⚠️ {} must be between 1 and {}, got {}; using {}", key, max, value, default);
        default
    }
}
