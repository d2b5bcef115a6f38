//! NATS JetStream backend.
//!
//! # Key Features
//!
//! - **Durable pull consumer**: filter subject with `*` wildcards, bounded
//!   `max_ack_pending` acting as the prefetch window
//! - **Ack semantics**: `Ack` on success, `Nak` to requeue, `Term` to discard
//! - **Publisher**: JSON publish with flush so failures are observed
//! - **Health Endpoints**: K8s-ready liveness/readiness probes
//! - **Prometheus Metrics**: deliveries by outcome, processing latency
//!
//! # Example
//!
//! ```rust,ignore
//! use messaging::nats::{ConsumerConfig, NatsConsumer, NatsPublisher};
//!
//! let client = async_nats::connect("nats://localhost:4222").await?;
//! let jetstream = async_nats::jetstream::new(client.clone());
//!
//! let consumer = NatsConsumer::new(jetstream, ConsumerConfig::default());
//! consumer.init().await?;
//!
//! let publisher = NatsPublisher::new(client);
//! publisher.publish_json("email.requests", &request).await?;
//! ```

mod config;
mod consumer;
mod health;
pub mod metrics;
mod publisher;

pub use config::{ConsumerConfig, StreamStorage};
pub use consumer::{nack_kind, NatsConsumer, NatsDelivery};
pub use health::{HealthServer, HealthState, HealthStatus};
pub use metrics::{init_metrics, DeliveryMetrics, DeliveryOutcome};
pub use publisher::NatsPublisher;
