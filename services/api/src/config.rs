//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub scorer_model: String,
    pub scorer_timeout: Duration,
    /// Whole-hour UTC offset of the service timezone; every calendar-day
    /// boundary (daily sets, quota, history grouping) derives from it.
    pub utc_offset_hours: i32,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Scorer Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let scorer_model =
            std::env::var("SCORER_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let scorer_timeout_secs = match std::env::var("SCORER_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("SCORER_TIMEOUT_SECS".to_string(), e.to_string())
            })?,
            Err(_) => 30,
        };

        // --- Service Timezone ---
        let utc_offset_hours = match std::env::var("UTC_OFFSET_HOURS") {
            Ok(raw) => raw.parse::<i32>().map_err(|e| {
                ConfigError::InvalidValue("UTC_OFFSET_HOURS".to_string(), e.to_string())
            })?,
            Err(_) => 9,
        };
        if !(-23..=23).contains(&utc_offset_hours) {
            return Err(ConfigError::InvalidValue(
                "UTC_OFFSET_HOURS".to_string(),
                format!("'{}' is not a valid whole-hour offset", utc_offset_hours),
            ));
        }

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            scorer_model,
            scorer_timeout: Duration::from_secs(scorer_timeout_secs),
            utc_offset_hours,
            cors_origin,
        })
    }
}
