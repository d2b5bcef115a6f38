use crate::{env_parse_or, env_required, ConfigError, FromEnv};

/// Database configuration
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn new(url: String) -> Self {
        Self {
            url,
            max_connections: 10,
            run_migrations: false,
        }
    }
}

impl FromEnv for DatabaseConfig {
    /// Requires DATABASE_URL to be set (no default)
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_required("DATABASE_URL")?,
            max_connections: env_parse_or("DB_MAX_CONNECTIONS", 10)?,
            run_migrations: env_parse_or("RUN_MIGRATIONS", false)?,
        })
    }
}
