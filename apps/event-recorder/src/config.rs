//! Service configuration

use core_config::database::DatabaseConfig;
use core_config::nats::NatsConfig;
use core_config::{env_or_default, env_parse_or, env_required, ConfigError, FromEnv};

/// Configuration for the event recorder
#[derive(Clone, Debug)]
pub struct RecorderConfig {
    pub nats: NatsConfig,
    pub database: DatabaseConfig,
    /// Subject email requests are published to
    pub email_request_subject: String,
    /// Prefix of the per-user subjects notifications are published to
    pub notification_subject_prefix: String,
    /// Recipient of alerts for discarded deliveries
    pub support_email: String,
    pub health_port: u16,
}

impl FromEnv for RecorderConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            nats: NatsConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            email_request_subject: env_or_default("EMAIL_REQUEST_SUBJECT", "email.requests"),
            notification_subject_prefix: env_or_default(
                "NOTIFICATION_SUBJECT_PREFIX",
                "notification",
            ),
            support_email: env_required("SUPPORT_EMAIL")?,
            health_port: env_parse_or("HEALTH_PORT", 8081)?,
        })
    }
}
