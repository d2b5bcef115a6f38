//! NATS publisher for outbound JSON messages.

use crate::error::{MessagingError, MessagingResult};
use async_nats::Client;
use serde::Serialize;
use tracing::debug;

/// Publisher for plain NATS subjects.
///
/// Every publish is followed by a flush, so a message that could not be
/// written to the server surfaces as an error to the caller.
#[derive(Clone)]
pub struct NatsPublisher {
    client: Client,
}

impl NatsPublisher {
    /// Create a new publisher.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish raw bytes to a subject.
    pub async fn publish(&self, subject: &str, payload: Vec<u8>) -> MessagingResult<()> {
        let size = payload.len();

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(MessagingError::publish)?;

        self.client.flush().await.map_err(MessagingError::publish)?;

        debug!(subject = %subject, bytes = size, "Message published");
        Ok(())
    }

    /// Serialize a value as JSON and publish it to a subject.
    pub async fn publish_json<T: Serialize + Sync>(
        &self,
        subject: &str,
        value: &T,
    ) -> MessagingResult<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish(subject, payload).await
    }
}
