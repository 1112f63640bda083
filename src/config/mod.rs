use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    /// 未配置时使用进程内缓存
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub reset_token_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub feed_cache_ttl_secs: u64,
    pub user_cache_ttl_secs: u64,
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub db_timeout_ms: u64,
    pub cache_timeout_ms: u64,
    pub http_timeout_ms: u64,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub storage_bucket: String,
    pub resend_api_key: String,
    pub mail_from: String,
    pub client_url: String,
    pub cookie_secure: bool,
    pub max_image_bytes: usize,
    pub bcrypt_cost: u32,
}

/// 可选环境变量，缺失或无法解析时取默认值
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        // JWT_EXPIRATION 以小时为单位，例如 "168h"
        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(24 * 7);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            reset_token_expiration_secs: env_or("RESET_TOKEN_EXPIRATION_SECS", 15 * 60),
            rate_limit_window_secs: env_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: env_or("RATE_LIMIT_REQUESTS", 100),
            server_host: env_string("SERVER_HOST", "0.0.0.0"),
            server_port: env_or("SERVER_PORT", 3000),
            api_base_uri: env_string("API_BASE_URI", "/api"),
            feed_cache_ttl_secs: env_or("FEED_CACHE_TTL_SECS", 60),
            user_cache_ttl_secs: env_or("USER_CACHE_TTL_SECS", 60),
            default_page_size: env_or("DEFAULT_PAGE_SIZE", 6),
            max_page_size: env_or("MAX_PAGE_SIZE", 50),
            db_timeout_ms: env_or("DB_TIMEOUT_MS", 5000),
            cache_timeout_ms: env_or("CACHE_TIMEOUT_MS", 500),
            http_timeout_ms: env_or("HTTP_TIMEOUT_MS", 10_000),
            supabase_url: env_string("SUPABASE_URL", ""),
            supabase_service_key: env_string("SUPABASE_SERVICE_KEY", ""),
            storage_bucket: env_string("STORAGE_BUCKET", "blog-images"),
            resend_api_key: env_string("RESEND_API_KEY", ""),
            mail_from: env_string("MAIL_FROM", "no-reply@localhost"),
            client_url: env_string("CLIENT_URL", "http://localhost:3000"),
            cookie_secure: env_or("COOKIE_SECURE", false),
            max_image_bytes: env_or("MAX_IMAGE_BYTES", 5 * 1024 * 1024),
            bcrypt_cost: env_or("BCRYPT_COST", bcrypt::DEFAULT_COST),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_millis(self.db_timeout_ms)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}
