use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(format!("expected json or text, got {other}")),
        }
    }
}

/// Process settings, read once at startup and passed to whatever needs them.
#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub api_version: String,

    /// `memory` selects the in-process store.
    pub database_url: String,
    pub db_pool_size: u32,
    pub db_max_overflow: u32,
    pub db_echo: bool,
    pub db_acquire_timeout: Duration,

    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub api_key_header: String,

    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Football Predictor API".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            debug: false,
            api_version: "v1".to_string(),
            database_url: "postgres://localhost/football_predictor".to_string(),
            db_pool_size: 10,
            db_max_overflow: 20,
            db_echo: false,
            db_acquire_timeout: Duration::from_secs(3),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            allowed_origins: vec!["*".to_string()],
            api_key_header: "X-API-Key".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

fn parse<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value: raw,
    })
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut s = Settings::default();

        if let Some(v) = lookup("APP_NAME") {
            s.app_name = v;
        }
        if let Some(v) = lookup("APP_VERSION") {
            s.app_version = v;
        }
        if let Some(v) = lookup("DEBUG") {
            s.debug = parse("DEBUG", v)?;
        }
        if let Some(v) = lookup("API_VERSION") {
            s.api_version = v;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = lookup("DB_POOL_SIZE") {
            s.db_pool_size = parse("DB_POOL_SIZE", v)?;
        }
        if let Some(v) = lookup("DB_MAX_OVERFLOW") {
            s.db_max_overflow = parse("DB_MAX_OVERFLOW", v)?;
        }
        if let Some(v) = lookup("DB_ECHO") {
            s.db_echo = parse("DB_ECHO", v)?;
        }
        if let Some(v) = lookup("DB_ACQUIRE_TIMEOUT_SECS") {
            s.db_acquire_timeout = Duration::from_secs(parse("DB_ACQUIRE_TIMEOUT_SECS", v)?);
        }
        if let Some(v) = lookup("BIND_ADDR") {
            s.bind_addr = parse("BIND_ADDR", v)?;
        }
        if let Some(v) = lookup("ALLOWED_ORIGINS") {
            s.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("API_KEY_HEADER") {
            s.api_key_header = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            s.log_level = v.to_ascii_lowercase();
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            s.log_format = parse("LOG_FORMAT", v)?;
        }

        Ok(s)
    }

    /// Upper bound on open connections: the base pool plus its overflow.
    pub fn max_connections(&self) -> u32 {
        self.db_pool_size + self.db_max_overflow
    }

    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == "memory"
    }
}
