pub mod database;
pub mod nats;
pub mod tracing;

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Deployment environment, selected by `APP_ENV`; it decides the log format
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Helper to load and parse environment variable with a default value
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Helper to load and parse environment variable or return error
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Helper to parse an environment variable into `T`, falling back to `default` when unset
pub fn env_parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
