//! Error types for bus operations.

use thiserror::Error;

/// Result type for bus operations.
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Error that can occur while talking to the message bus.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Stream or consumer management error
    #[error("JetStream error: {0}")]
    JetStream(String),

    /// Error receiving a delivery
    #[error("receive error: {0}")]
    Receive(String),

    /// Acknowledgement error
    #[error("acknowledgement error: {0}")]
    Ack(String),

    /// Publish error
    #[error("publish error: {0}")]
    Publish(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MessagingError {
    /// Create a JetStream error from any displayable backend error.
    pub fn jetstream(error: impl std::fmt::Display) -> Self {
        Self::JetStream(error.to_string())
    }

    /// Create a receive error.
    pub fn receive(error: impl std::fmt::Display) -> Self {
        Self::Receive(error.to_string())
    }

    /// Create an acknowledgement error.
    pub fn ack(error: impl std::fmt::Display) -> Self {
        Self::Ack(error.to_string())
    }

    /// Create a publish error.
    pub fn publish(error: impl std::fmt::Display) -> Self {
        Self::Publish(error.to_string())
    }
}
