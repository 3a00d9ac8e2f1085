//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// OpenAI-compatible endpoint used when only a Gemini key is configured.
pub const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which credentials the model provider client is built with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: String,
    /// `None` means the SDK's default OpenAI endpoint.
    pub api_base: Option<String>,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,
    pub provider: ProviderCredentials,
    pub lesson_model: String,
    pub improve_model: String,
    pub generation_timeout: Option<Duration>,
    /// How long a session without an open socket is kept after its last request.
    pub session_idle_timeout: Duration,
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
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Provider Credentials ---
        // An OpenAI key wins; a Gemini key alone routes to Gemini's OpenAI-compatible API.
        let explicit_base = var("MODEL_API_BASE");
        let (provider, default_model) = match (var("OPENAI_API_KEY"), var("GEMINI_API_KEY")) {
            (Some(api_key), _) => (
                ProviderCredentials {
                    api_key,
                    api_base: explicit_base,
                },
                "gpt-4o-mini",
            ),
            (None, Some(api_key)) => (
                ProviderCredentials {
                    api_key,
                    api_base: Some(explicit_base.unwrap_or_else(|| GEMINI_OPENAI_BASE.to_string())),
                },
                "gemini-2.0-flash",
            ),
            (None, None) => return Err(ConfigError::MissingVar("OPENAI_API_KEY".to_string())),
        };

        // --- Flow-specific Settings ---
        let lesson_model = var("LESSON_MODEL").unwrap_or_else(|| default_model.to_string());
        let improve_model = var("IMPROVE_MODEL").unwrap_or_else(|| lesson_model.clone());

        let generation_timeout = match var("GENERATION_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("GENERATION_TIMEOUT_SECS".to_string(), e.to_string())
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let session_idle_str = var("SESSION_IDLE_SECS").unwrap_or_else(|| "3600".to_string());
        let session_idle_timeout = session_idle_str
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue("SESSION_IDLE_SECS".to_string(), e.to_string()))?;

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            provider,
            lesson_model,
            improve_model,
            generation_timeout,
            session_idle_timeout,
        })
    }
}
