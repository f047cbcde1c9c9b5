use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use dotenvy::dotenv;

use crate::utils::geo::Position;
use crate::utils::office::{LeavePolicy, OfficeConfig};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    /// `APP_ENV=production`; disables the attendance reset
    pub production: bool,

    pub log_dir: String,
    pub log_level: tracing::Level,

    pub db_max_connections: u32,
    pub attendance_timeout: Duration,
    pub leave_timeout: Duration,

    pub office: OfficeConfig,
    pub leave_policy: LeavePolicy,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

/// Parses `key` if present, `default` otherwise.
fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {key}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let defaults = OfficeConfig::default();
        let office = OfficeConfig {
            center: Position::new(
                parsed("OFFICE_LAT", defaults.center.lat)?,
                parsed("OFFICE_LNG", defaults.center.lng)?,
            ),
            radius_m: parsed("OFFICE_RADIUS_M", defaults.radius_m)?,
            epsilon_m: parsed("OFFICE_EPSILON_M", defaults.epsilon_m)?,
            timezone: parsed::<Tz>("OFFICE_TZ", defaults.timezone)?,
        };

        let leave_policy = LeavePolicy {
            annual_quota_days: parsed("ANNUAL_LEAVE_QUOTA", LeavePolicy::default().annual_quota_days)?,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parsed("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: parsed("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parsed("RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parsed("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            production: env::var("APP_ENV").is_ok_and(|v| v.eq_ignore_ascii_case("production")),

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: parsed("LOG_LEVEL", tracing::Level::INFO)?,

            db_max_connections: parsed("DB_MAX_CONNECTIONS", 10)?,
            attendance_timeout: Duration::from_secs(parsed("STORE_TIMEOUT_SECS", 3)?),
            leave_timeout: Duration::from_secs(parsed("LEAVE_STORE_TIMEOUT_SECS", 5)?),

            office,
            leave_policy,
        })
    }

    /// Fixed values for handler tests; nothing is read from the environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604_800,
            rate_login_per_min: 60,
            rate_register_per_min: 30,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            production: false,
            log_dir: "logs".to_string(),
            log_level: tracing::Level::INFO,
            db_max_connections: 1,
            attendance_timeout: Duration::from_secs(3),
            leave_timeout: Duration::from_secs(5),
            office: OfficeConfig::default(),
            leave_policy: LeavePolicy::default(),
        }
    }
}
