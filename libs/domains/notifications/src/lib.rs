//! Notifications Domain
//!
//! Records update events from the message bus as notifications and republishes
//! them, enriched with the user's unread count, for the UI.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   HandlerSet    │  ← Parses routing keys, settles deliveries
//! └────────┬────────┘
//!          │ category
//! ┌────────▼────────┐
//! │  LegacyHandler  │  ← One store transaction per delivery
//! └───┬─────────┬───┘
//!     │         │
//! ┌───▼───┐ ┌───▼──────────────┐
//! │ Store │ │ MessagingGateway │  ← Postgres / NATS adapters
//! └───────┘ └──────────────────┘
//! ```
//!
//! Failures are reported as [`HandlerError`]s. Unrecoverable errors discard the
//! delivery and alert the support address; everything else is requeued.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{init_message_handlers, HandlerSet, NatsGateway, PgStore};
//!
//! let store = Arc::new(PgStore::new(db));
//! let gateway = Arc::new(NatsGateway::new(publisher, "email.requests", "notification"));
//! let handlers = init_message_handlers(store, gateway.clone());
//!
//! let handler_set = HandlerSet::new(handlers, gateway, support_email, "event_listener");
//! handler_set.listen(consumer.deliveries().await?, shutdown_rx).await?;
//! ```

pub mod entity;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod handlerset;
pub mod models;
pub mod postgres;
pub mod routing;
pub mod store;
pub mod timestamps;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use error::{
    Classify, ErrorKind, GatewayError, HandlerError, HandlerResult, RoutingKeyError, StoreError,
    StoreResult,
};
pub use gateway::{MessagingGateway, NatsGateway};
pub use handlers::{init_message_handlers, HandlerRegistry, LegacyHandler, MessageHandler};
pub use handlerset::HandlerSet;
pub use models::{
    EmailRequest, LegacyRequest, Notification, OutgoingMessageBody, OutgoingNotificationMessage,
    WrappedNotificationMessage,
};
pub use postgres::PgStore;
pub use routing::{parse_routing_key, RoutingKey};
pub use store::Store;
