//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. Both desks read the same configuration;
//! each binary only uses the parts it needs.

use std::net::SocketAddr;
use std::str::FromStr;

use bizdesk_core::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use bizdesk_core::retry::{DEFAULT_FALLBACK_MAX_LENGTH, DEFAULT_MAX_ATTEMPTS};
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
    pub tax_bind_address: SocketAddr,
    pub docs_bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub allowed_origin: String,
    pub session_ttl_days: i64,

    // Hosted model
    pub openai_api_key: Option<String>,
    pub llm_api_base: Option<String>,
    pub llm_model: String,
    pub llm_max_retries: u32,
    pub llm_concurrency: usize,

    // Local fallback model
    pub fallback_url: String,
    pub fallback_model: String,
    pub fallback_max_length: usize,

    // Chunking
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    // Object storage
    pub storage_base_url: Option<String>,
    pub storage_bucket: String,
    pub storage_token: Option<String>,
}

/// Reads `name`, falling back to `default` when it is unset.
fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn at_least<T: PartialOrd + std::fmt::Display>(
    name: &str,
    value: T,
    min: T,
) -> Result<T, ConfigError> {
    if value < min {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("must be at least {min}, got {value}"),
        ));
    }
    Ok(value)
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
        let tax_bind_address = parse_var::<SocketAddr>(
            "TAX_BIND_ADDRESS",
            SocketAddr::from(([0, 0, 0, 0], 3000)),
        )?;
        let docs_bind_address = parse_var::<SocketAddr>(
            "DOCS_BIND_ADDRESS",
            SocketAddr::from(([0, 0, 0, 0], 3001)),
        )?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin = var_or("ALLOWED_ORIGIN", "http://localhost:3000");
        let session_ttl_days = at_least("SESSION_TTL_DAYS", parse_var("SESSION_TTL_DAYS", 30i64)?, 1)?;

        // --- Load Model Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let llm_api_base = std::env::var("LLM_API_BASE").ok();
        let llm_model = var_or("LLM_MODEL", "gpt-4o-mini");
        let llm_max_retries = at_least(
            "LLM_MAX_RETRIES",
            parse_var("LLM_MAX_RETRIES", DEFAULT_MAX_ATTEMPTS)?,
            1,
        )?;
        let llm_concurrency = at_least("LLM_CONCURRENCY", parse_var("LLM_CONCURRENCY", 1usize)?, 1)?;

        let fallback_url = var_or("FALLBACK_URL", "http://localhost:11434");
        let fallback_model = var_or("FALLBACK_MODEL", "flan-t5-base");
        let fallback_max_length = at_least(
            "FALLBACK_MAX_LENGTH",
            parse_var("FALLBACK_MAX_LENGTH", DEFAULT_FALLBACK_MAX_LENGTH)?,
            1,
        )?;

        // --- Load Chunking Settings ---
        let chunk_size = at_least("CHUNK_SIZE", parse_var("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?, 1)?;
        let chunk_overlap = parse_var("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?;
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::InvalidValue(
                "CHUNK_OVERLAP".to_string(),
                format!("must be smaller than CHUNK_SIZE ({chunk_size}), got {chunk_overlap}"),
            ));
        }

        // --- Load Storage Settings ---
        let storage_base_url = std::env::var("STORAGE_BASE_URL").ok();
        let storage_bucket = std::env::var("STORAGE_BUCKET")
            .map_err(|_| ConfigError::MissingVar("STORAGE_BUCKET".to_string()))?;
        let storage_token = std::env::var("STORAGE_TOKEN").ok();

        Ok(Self {
            tax_bind_address,
            docs_bind_address,
            database_url,
            log_level,
            allowed_origin,
            session_ttl_days,
            openai_api_key,
            llm_api_base,
            llm_model,
            llm_max_retries,
            llm_concurrency,
            fallback_url,
            fallback_model,
            fallback_max_length,
            chunk_size,
            chunk_overlap,
            storage_base_url,
            storage_bucket,
            storage_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        let value: usize = parse_var("BIZDESK_TEST_SURELY_UNSET", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_at_least_rejects_small_values() {
        assert!(at_least("X", 0usize, 1).is_err());
        assert_eq!(at_least("X", 3u32, 1).unwrap(), 3);
    }
}
