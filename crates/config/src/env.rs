use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Budget for one metrics computation before it fails closed.
    pub aggregation_timeout_ms: u64,
    /// Age after which a `running` sync run is swept to `failed`.
    pub stale_run_timeout_mins: i64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> CrmirrorResult<Self> {
        let _ = dotenvy::dotenv();

        let stale_run_timeout_mins: i64 = parse_var_or("STALE_RUN_TIMEOUT_MINS", 120)?;
        if stale_run_timeout_mins <= 0 {
            return Err(CrmirrorError::Config(
                "STALE_RUN_TIMEOUT_MINS must be positive".to_owned(),
            ));
        }

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            host: get_var_or("HOST", "0.0.0.0"),
            port: parse_var_or("PORT", 8080)?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            aggregation_timeout_ms: parse_var_or("AGGREGATION_TIMEOUT_MS", 5000)?,
            stale_run_timeout_mins,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn stale_run_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.stale_run_timeout_mins)
    }

    pub fn aggregation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.aggregation_timeout_ms)
    }
}

pub fn get_var(key: &str) -> CrmirrorResult<String> {
    env::var(key).map_err(|_| CrmirrorError::Config(format!("{key} is required but not set")))
}

pub fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an optional variable, failing on a present-but-malformed value.
pub fn parse_var_or<T>(key: &str, default: T) -> CrmirrorResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CrmirrorError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
