//! Runtime configuration, read once at startup from the environment

use anyhow::{bail, Context, Result};
use chrono::Duration;
use std::env;
use tracing::warn;

const DEV_JWT_SECRET: &str = "helyx-dev-secret-change-me-before-deploying-anywhere";
const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub db_path: String,
    pub session_ttl: Duration,
    pub reset_ttl: Duration,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub frontend_url: String,
    pub email_send_timeout: std::time::Duration,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("⚠️ JWT_SECRET not set, using the development secret. Never run like this in production!");
                DEV_JWT_SECRET.to_string()
            }
        };
        if jwt_secret.len() < MIN_SECRET_BYTES {
            bail!(
                "JWT_SECRET must be at least {} bytes (got {})",
                MIN_SECRET_BYTES,
                jwt_secret.len()
            );
        }

        let session_ttl_hours: i64 = parse_or(get("SESSION_TTL_HOURS"), "SESSION_TTL_HOURS", 168)?;
        let reset_ttl_minutes: i64 = parse_or(get("RESET_TTL_MINUTES"), "RESET_TTL_MINUTES", 60)?;
        let bcrypt_cost: u32 = parse_or(get("BCRYPT_COST"), "BCRYPT_COST", 12)?;
        let email_timeout_secs: u64 =
            parse_or(get("EMAIL_SEND_TIMEOUT_SECS"), "EMAIL_SEND_TIMEOUT_SECS", 10)?;

        if session_ttl_hours <= 0 {
            bail!("SESSION_TTL_HOURS must be positive");
        }
        if reset_ttl_minutes <= 0 {
            bail!("RESET_TTL_MINUTES must be positive");
        }
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31 (got {})", bcrypt_cost);
        }

        Ok(Self {
            jwt_secret,
            db_path: get("AUTH_DB_PATH").unwrap_or_else(|| "helyx_auth.db".to_string()),
            session_ttl: Duration::hours(session_ttl_hours),
            reset_ttl: Duration::minutes(reset_ttl_minutes),
            bcrypt_cost,
            cookie_secure: get("COOKIE_SECURE")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
                .unwrap_or(false),
            frontend_url: get("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            email_send_timeout: std::time::Duration::from_secs(email_timeout_secs),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid {}: {:?}", key, v)),
        None => Ok(default),
    }
}
