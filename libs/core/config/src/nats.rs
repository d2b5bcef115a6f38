use crate::{env_or_default, ConfigError, FromEnv};

/// Connection and topology settings for the NATS bus
#[derive(Clone, Debug)]
pub struct NatsConfig {
    pub url: String,
    /// Stream the update events are published to
    pub stream: String,
    /// Stream storage, `file` or `memory`
    pub storage: String,
    /// Durable consumer shared by all instances of the service
    pub consumer: String,
}

impl FromEnv for NatsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let storage = env_or_default("EVENTS_STORAGE", "file").to_ascii_lowercase();
        if storage != "file" && storage != "memory" {
            return Err(ConfigError::ParseError {
                key: "EVENTS_STORAGE".to_string(),
                details: format!("expected 'file' or 'memory', got '{}'", storage),
            });
        }

        Ok(Self {
            url: env_or_default("NATS_URL", "nats://localhost:4222"),
            stream: env_or_default("EVENTS_STREAM", "EVENTS"),
            storage,
            consumer: env_or_default("EVENTS_CONSUMER", "event_listener"),
        })
    }
}
