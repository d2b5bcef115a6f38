//! Error types for the notifications domain.
//!
//! [`HandlerError`] carries the classification that decides what happens to a
//! delivery: unrecoverable errors are discarded, everything else is requeued.

use messaging::MessagingError;
use std::fmt::Display;
use thiserror::Error;

/// Result type for message handlers.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// How the dispatcher should treat a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retrying later is expected to succeed
    Recoverable,
    /// Retrying will reproduce the same failure
    Unrecoverable,
    /// Not classified by the code that raised it, retried to avoid losing data
    PresumedRecoverable,
}

/// Error returned by a message handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Transient failure, e.g. the database or bus is unavailable
    #[error("{0}")]
    Recoverable(String),

    /// Permanent failure, e.g. malformed input or a violated invariant
    #[error("{0}")]
    Unrecoverable(String),

    /// Failure raised by collaborator code without an explicit classification
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self::Recoverable(message.into())
    }

    pub fn unrecoverable(message: impl Into<String>) -> Self {
        Self::Unrecoverable(message.into())
    }

    /// The classification used by the dispatcher.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Recoverable(_) => ErrorKind::Recoverable,
            HandlerError::Unrecoverable(_) => ErrorKind::Unrecoverable,
            HandlerError::Other(_) => ErrorKind::PresumedRecoverable,
        }
    }

    /// Whether the delivery should go back to the bus for another attempt.
    pub fn should_requeue(&self) -> bool {
        self.kind() != ErrorKind::Unrecoverable
    }

    pub fn message(&self) -> &str {
        match self {
            HandlerError::Recoverable(msg)
            | HandlerError::Unrecoverable(msg)
            | HandlerError::Other(msg) => msg,
        }
    }

    /// Prefix the message with `context`, keeping the kind.
    pub fn context(self, context: impl Display) -> Self {
        match self {
            HandlerError::Recoverable(msg) => {
                HandlerError::Recoverable(format!("{}: {}", context, msg))
            }
            HandlerError::Unrecoverable(msg) => {
                HandlerError::Unrecoverable(format!("{}: {}", context, msg))
            }
            HandlerError::Other(msg) => HandlerError::Other(format!("{}: {}", context, msg)),
        }
    }
}

/// Classify an arbitrary error while adding context to it.
pub trait Classify<T> {
    fn recoverable(self, context: &str) -> HandlerResult<T>;
    fn unrecoverable(self, context: &str) -> HandlerResult<T>;
}

impl<T, E: Display> Classify<T> for Result<T, E> {
    fn recoverable(self, context: &str) -> HandlerResult<T> {
        self.map_err(|e| HandlerError::Recoverable(format!("{}: {}", context, e)))
    }

    fn unrecoverable(self, context: &str) -> HandlerResult<T> {
        self.map_err(|e| HandlerError::Unrecoverable(format!("{}: {}", context, e)))
    }
}

/// Errors raised by a [`Store`](crate::store::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("unexpected number of rows affected: {0}")]
    UnexpectedRowCount(u64),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Errors raised by a [`MessagingGateway`](crate::gateway::MessagingGateway).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unable to publish to '{subject}': {source}")]
    Publish {
        subject: String,
        #[source]
        source: MessagingError,
    },

    #[error("invalid subject '{0}'")]
    InvalidSubject(String),
}

impl GatewayError {
    /// Whether publishing again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Publish { .. })
    }
}

/// Error parsing a delivery's routing key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingKeyError {
    #[error("routing key {0} has too few components")]
    TooFewComponents(String),
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        HandlerError::Other(err.to_string())
    }
}

impl From<GatewayError> for HandlerError {
    fn from(err: GatewayError) -> Self {
        HandlerError::Other(err.to_string())
    }
}

impl From<MessagingError> for HandlerError {
    fn from(err: MessagingError) -> Self {
        HandlerError::Other(err.to_string())
    }
}
