//! Received messages and their settlement.

use crate::error::MessagingResult;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A single message received from the bus.
///
/// Every delivery must be settled exactly once, either with [`Delivery::ack`]
/// or with [`Delivery::nack`].
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Dot-delimited routing key the message was published with.
    fn routing_key(&self) -> &str;

    /// Raw message body.
    fn body(&self) -> &[u8];

    /// Number of times the bus has delivered this message (1 on first delivery).
    fn delivery_count(&self) -> u64 {
        1
    }

    /// Acknowledge successful processing.
    async fn ack(&self) -> MessagingResult<()>;

    /// Negatively acknowledge. With `requeue` the bus redelivers the message,
    /// without it the message is discarded.
    async fn nack(&self, requeue: bool) -> MessagingResult<()>;
}

/// Stream of deliveries produced by a consumer.
pub type DeliveryStream<D> = BoxStream<'static, MessagingResult<D>>;
