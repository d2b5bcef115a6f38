//! Delivery abstractions for bus-driven services.
//!
//! This library provides backend-agnostic types for consuming deliveries from a
//! message bus and settling them:
//! - **Delivery**: one received message with its routing key, body and ack/nack
//! - **MessagingError**: failures talking to the bus
//!
//! With the `nats` feature it also provides the NATS JetStream backend: a durable
//! pull consumer, a JSON publisher, health endpoints and Prometheus metrics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────────┐     ┌────────────────┐
//! │  NATS JetStream  │────▶│  NatsConsumer        │────▶│  Your dispatch │
//! │  (events stream) │     │  (NatsDelivery items)│     │  loop          │
//! └──────────────────┘     └──────────────────────┘     └───────┬────────┘
//!          ▲                                                    │ ack / nack
//!          └────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use messaging::Delivery;
//! use messaging::nats::{ConsumerConfig, NatsConsumer};
//!
//! let consumer = NatsConsumer::new(jetstream, ConsumerConfig::default());
//! consumer.init().await?;
//! let mut deliveries = consumer.deliveries().await?;
//! while let Some(delivery) = deliveries.next().await {
//!     let delivery = delivery?;
//!     println!("{}", delivery.routing_key());
//!     delivery.ack().await?;
//! }
//! ```

mod delivery;
mod error;

#[cfg(feature = "nats")]
pub mod nats;

pub use delivery::{Delivery, DeliveryStream};
pub use error::{MessagingError, MessagingResult};
