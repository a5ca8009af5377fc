//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

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
    pub summary_api_url: String,
    pub database_url: String,
    pub log_level: Level,
    pub request_timeout: Duration,
    pub speech_command: String,
    pub history_limit: i64,
    pub user_agent: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Remote Endpoints ---
        let summary_api_url = var("SUMMARY_API_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();
        if !summary_api_url.starts_with("http://") && !summary_api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "SUMMARY_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", summary_api_url),
            ));
        }

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        // --- Logging ---
        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Request and Playback Settings ---
        let timeout_secs = parse_positive(&var, "REQUEST_TIMEOUT_SECS", 60)?;
        let history_limit = parse_positive(&var, "HISTORY_LIMIT", 50)?;
        let speech_command = var("SPEECH_COMMAND").unwrap_or_else(|| "espeak".to_string());
        let user_agent = var("USER_AGENT")
            .unwrap_or_else(|| format!("open-blinkist-client/{}", env!("CARGO_PKG_VERSION")));

        Ok(Self {
            summary_api_url,
            database_url,
            log_level,
            request_timeout: Duration::from_secs(timeout_secs),
            speech_command,
            history_limit: i64::try_from(history_limit).unwrap_or(i64::MAX),
            user_agent,
        })
    }
}

fn parse_positive(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match var(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a positive integer", raw),
            )),
        },
    }
}
