//! Configuration for the JetStream consumer.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Storage backing the events stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStorage {
    /// Persist messages on disk
    #[default]
    File,
    /// Keep messages in memory only
    Memory,
}

impl StreamStorage {
    pub(crate) fn to_storage_type(self) -> async_nats::jetstream::stream::StorageType {
        match self {
            StreamStorage::File => async_nats::jetstream::stream::StorageType::File,
            StreamStorage::Memory => async_nats::jetstream::stream::StorageType::Memory,
        }
    }
}

impl FromStr for StreamStorage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(StreamStorage::File),
            "memory" => Ok(StreamStorage::Memory),
            other => Err(format!("unknown stream storage '{}'", other)),
        }
    }
}

impl fmt::Display for StreamStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStorage::File => write!(f, "file"),
            StreamStorage::Memory => write!(f, "memory"),
        }
    }
}

/// Consumer configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// JetStream stream name
    pub stream_name: String,

    /// Subjects captured by the stream
    pub stream_subjects: Vec<String>,

    /// Stream storage
    pub storage: StreamStorage,

    /// Durable consumer name (shared by all instances of the service)
    pub durable_name: String,

    /// Subject filter for the consumer
    pub filter_subject: String,

    /// Maximum unacknowledged deliveries in flight
    pub max_ack_pending: i64,

    /// Ack wait timeout before the server redelivers
    pub ack_wait: Duration,

    /// Maximum age of messages kept in the stream
    pub max_age: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            stream_name: "EVENTS".to_string(),
            stream_subjects: vec!["events.>".to_string()],
            storage: StreamStorage::File,
            durable_name: "event_listener".to_string(),
            filter_subject: "events.*.update.*".to_string(),
            max_ack_pending: 100,
            ack_wait: Duration::from_secs(30),
            max_age: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
        }
    }
}

impl ConsumerConfig {
    /// Create a configuration for the given stream name.
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            ..Default::default()
        }
    }

    /// Set the stream storage.
    pub fn with_storage(mut self, storage: StreamStorage) -> Self {
        self.storage = storage;
        self
    }

    /// Set the durable consumer name.
    pub fn with_durable_name(mut self, name: impl Into<String>) -> Self {
        self.durable_name = name.into();
        self
    }

    /// Set the consumer filter subject.
    pub fn with_filter_subject(mut self, subject: impl Into<String>) -> Self {
        self.filter_subject = subject.into();
        self
    }

    /// Set the prefetch window.
    pub fn with_max_ack_pending(mut self, max: i64) -> Self {
        self.max_ack_pending = max;
        self
    }

    /// Set the ack wait timeout.
    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = ack_wait;
        self
    }
}
