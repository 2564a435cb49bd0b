//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPMATE_TOKEN_SECRET` - Bearer token signing secret (min 32 chars)
//!
//! ## Optional
//! - `SHOPMATE_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPMATE_PORT` - Listen port (default: 3000)
//! - `SHOPMATE_DATABASE_URL` - `PostgreSQL` connection string; falls back
//!   to `DATABASE_URL`. Without either the server runs on the in-memory
//!   store.
//! - `SHOPMATE_TOKEN_TTL_SECS` - Bearer token lifetime (default: 86400)
//! - `OLLAMA_BASE_URL` - Completion backend (default: <http://localhost:11434>)
//! - `OLLAMA_MODEL` - Model name (default: llama3)
//! - `SHOPMATE_ANON_SESSION_TTL_DAYS` - Anonymous chat session TTL (default: 14)
//! - `SHOPMATE_STREAM_TIMEOUT_SECS` - SSE inactivity timeout (default: 600)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Completion backend configuration.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// `PostgreSQL` connection URL; `None` selects the in-memory store
    pub database_url: Option<SecretString>,
    /// Bearer token signing secret
    pub token_secret: SecretString,
    /// Bearer token lifetime in seconds
    pub token_ttl_secs: i64,
    /// Completion backend
    pub ollama: OllamaConfig,
    /// TTL for anonymous chat sessions, in days
    pub anonymous_session_ttl_days: i64,
    /// SSE inactivity timeout, in seconds
    pub stream_timeout_secs: u64,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if the token secret is too short.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("SHOPMATE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPMATE_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("SHOPMATE_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPMATE_PORT".to_string(), e.to_string()))?;

        let database_url = get_database_url("SHOPMATE_DATABASE_URL");

        let token_secret = get_required_secret("SHOPMATE_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "SHOPMATE_TOKEN_SECRET")?;
        let token_ttl_secs = parse_env_or_default("SHOPMATE_TOKEN_TTL_SECS", 86_400)?;

        let ollama = OllamaConfig {
            base_url: get_env_or_default("OLLAMA_BASE_URL", "http://localhost:11434"),
            model: get_env_or_default("OLLAMA_MODEL", "llama3"),
        };

        let anonymous_session_ttl_days = parse_env_or_default("SHOPMATE_ANON_SESSION_TTL_DAYS", 14)?;
        let stream_timeout_secs = parse_env_or_default("SHOPMATE_STREAM_TIMEOUT_SECS", 600)?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            host,
            port,
            database_url,
            token_secret,
            token_ttl_secs,
            ollama,
            anonymous_session_ttl_days,
            stream_timeout_secs,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable into a number, defaulting when unset.
fn parse_env_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Validate that the token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}
