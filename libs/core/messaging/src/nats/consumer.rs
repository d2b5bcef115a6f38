//! NATS JetStream consumer for receiving deliveries.

use crate::delivery::{Delivery, DeliveryStream};
use crate::error::{MessagingError, MessagingResult};
use crate::nats::config::ConsumerConfig;
use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::{AckPolicy, Consumer};
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::jetstream::{AckKind, Context, Message};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Consumer for receiving deliveries from NATS JetStream.
pub struct NatsConsumer {
    jetstream: Arc<Context>,
    config: ConsumerConfig,
}

impl NatsConsumer {
    /// Create a new NATS consumer.
    pub fn new(jetstream: Context, config: ConsumerConfig) -> Self {
        Self {
            jetstream: Arc::new(jetstream),
            config,
        }
    }

    /// Get the stream name.
    pub fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    /// Get the durable consumer name.
    pub fn durable_name(&self) -> &str {
        &self.config.durable_name
    }

    /// Ensure the stream exists, creating it if necessary.
    pub async fn ensure_stream(&self) -> MessagingResult<()> {
        match self.jetstream.get_stream(&self.config.stream_name).await {
            Ok(mut stream) => {
                let info = stream.info().await.map_err(MessagingError::jetstream)?;
                debug!(
                    stream = %self.config.stream_name,
                    messages = info.state.messages,
                    "Stream already exists"
                );
                Ok(())
            }
            Err(_) => {
                info!(
                    stream = %self.config.stream_name,
                    subjects = ?self.config.stream_subjects,
                    storage = %self.config.storage,
                    "Creating stream"
                );

                self.jetstream
                    .create_stream(StreamConfig {
                        name: self.config.stream_name.clone(),
                        subjects: self.config.stream_subjects.clone(),
                        storage: self.config.storage.to_storage_type(),
                        max_age: self.config.max_age,
                        ..Default::default()
                    })
                    .await
                    .map_err(MessagingError::jetstream)?;

                info!(stream = %self.config.stream_name, "Stream created");
                Ok(())
            }
        }
    }

    /// Ensure the durable consumer exists, creating it if necessary.
    pub async fn ensure_consumer(&self) -> MessagingResult<Consumer<PullConfig>> {
        let stream = self
            .jetstream
            .get_stream(&self.config.stream_name)
            .await
            .map_err(MessagingError::jetstream)?;

        match stream
            .get_consumer::<PullConfig>(&self.config.durable_name)
            .await
        {
            Ok(consumer) => {
                debug!(consumer = %self.config.durable_name, "Consumer already exists");
                Ok(consumer)
            }
            Err(_) => {
                info!(
                    consumer = %self.config.durable_name,
                    stream = %self.config.stream_name,
                    filter = %self.config.filter_subject,
                    max_ack_pending = self.config.max_ack_pending,
                    "Creating consumer"
                );

                let consumer = stream
                    .create_consumer(PullConfig {
                        durable_name: Some(self.config.durable_name.clone()),
                        name: Some(self.config.durable_name.clone()),
                        ack_policy: AckPolicy::Explicit,
                        ack_wait: self.config.ack_wait,
                        max_ack_pending: self.config.max_ack_pending,
                        filter_subject: self.config.filter_subject.clone(),
                        ..Default::default()
                    })
                    .await
                    .map_err(MessagingError::jetstream)?;

                info!(consumer = %self.config.durable_name, "Consumer created");
                Ok(consumer)
            }
        }
    }

    /// Initialize stream and consumer.
    pub async fn init(&self) -> MessagingResult<()> {
        self.ensure_stream().await?;
        self.ensure_consumer().await?;
        Ok(())
    }

    /// Open a continuous stream of deliveries.
    ///
    /// The server never has more than `max_ack_pending` unsettled deliveries
    /// outstanding for this consumer.
    pub async fn deliveries(&self) -> MessagingResult<DeliveryStream<NatsDelivery>> {
        let consumer = self.ensure_consumer().await?;

        let messages = consumer
            .messages()
            .await
            .map_err(MessagingError::jetstream)?;

        Ok(messages
            .map(|result| {
                result
                    .map(NatsDelivery::from_message)
                    .map_err(MessagingError::receive)
            })
            .boxed())
    }
}

/// Ack kind used for a negative acknowledgement.
///
/// Requeueing maps to `Nak`, which makes the server redeliver; discarding maps to
/// `Term`, which stops redelivery for good.
pub fn nack_kind(requeue: bool) -> AckKind {
    if requeue {
        AckKind::Nak(None)
    } else {
        AckKind::Term
    }
}

/// A delivery received from JetStream.
pub struct NatsDelivery {
    message: Message,
    routing_key: String,
    delivery_count: u64,
}

impl NatsDelivery {
    fn from_message(message: Message) -> Self {
        let routing_key = message.subject.to_string();
        let delivery_count = match message.info() {
            Ok(info) => info.delivered.max(1) as u64,
            Err(e) => {
                warn!(error = %e, "Failed to get message info, assuming first delivery");
                1
            }
        };

        Self {
            message,
            routing_key,
            delivery_count,
        }
    }
}

#[async_trait]
impl Delivery for NatsDelivery {
    fn routing_key(&self) -> &str {
        &self.routing_key
    }

    fn body(&self) -> &[u8] {
        &self.message.payload
    }

    fn delivery_count(&self) -> u64 {
        self.delivery_count
    }

    async fn ack(&self) -> MessagingResult<()> {
        self.message.ack().await.map_err(MessagingError::ack)
    }

    async fn nack(&self, requeue: bool) -> MessagingResult<()> {
        self.message
            .ack_with(nack_kind(requeue))
            .await
            .map_err(MessagingError::ack)
    }
}
