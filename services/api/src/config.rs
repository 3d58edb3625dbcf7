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
    pub analysis_model: String,
    pub idea_model: String,
    pub chapter_model: String,
    /// Bound on each link-transcript fetch.
    pub transcript_timeout: Duration,
    /// Soft threshold for the analysis pacing policy.
    pub analysis_soft_timeout: Duration,
    /// Hard ceiling for the analysis pacing policy.
    pub analysis_hard_timeout: Duration,
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

        // --- Load Server and Database Settings ---
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

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let analysis_model =
            std::env::var("ANALYSIS_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let idea_model = std::env::var("IDEA_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let chapter_model =
            std::env::var("CHAPTER_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let transcript_timeout = secs_var("TRANSCRIPT_TIMEOUT_SECS", 30)?;
        let analysis_soft_timeout = secs_var("ANALYSIS_SOFT_TIMEOUT_SECS", 20)?;
        let analysis_hard_timeout = secs_var("ANALYSIS_HARD_TIMEOUT_SECS", 75)?;
        if analysis_hard_timeout < analysis_soft_timeout {
            return Err(ConfigError::InvalidValue(
                "ANALYSIS_HARD_TIMEOUT_SECS".to_string(),
                "must not be smaller than ANALYSIS_SOFT_TIMEOUT_SECS".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            analysis_model,
            idea_model,
            chapter_model,
            transcript_timeout,
            analysis_soft_timeout,
            analysis_hard_timeout,
        })
    }
}

/// Read a whole-seconds duration variable with a default.
fn secs_var(name: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(Duration::from_secs(default_secs)),
        Ok(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
            ConfigError::InvalidValue(
                name.to_string(),
                format!("'{raw}' is not a whole number of seconds"),
            )
        }),
    }
}
