//! Delivery dispatch.
//!
//! Every delivery is settled exactly once:
//!
//! | result                         | settlement           |
//! |--------------------------------|----------------------|
//! | malformed routing key          | nack, no requeue     |
//! | no handler for the category    | ack                  |
//! | handler succeeded              | ack                  |
//! | unrecoverable error            | nack, no requeue (+ support email) |
//! | recoverable or unclassified    | nack, requeue        |

use futures::StreamExt;
use messaging::nats::{DeliveryMetrics, DeliveryOutcome};
use messaging::{Delivery, DeliveryStream, MessagingError, MessagingResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{ErrorKind, HandlerError};
use crate::gateway::MessagingGateway;
use crate::handlers::HandlerRegistry;
use crate::models::EmailRequest;
use crate::routing::parse_routing_key;

pub const DISCARD_EMAIL_SUBJECT: &str = "Unrecoverable Error in the Event Recorder service";
pub const DISCARD_EMAIL_TEMPLATE: &str = "notifications_event_discarded";

/// Metric label for deliveries whose category has no handler or could not be parsed.
const OTHER_CATEGORY: &str = "other";

/// Dispatches deliveries to the handler registered for their category.
pub struct HandlerSet {
    handlers: HandlerRegistry,
    gateway: Arc<dyn MessagingGateway>,
    support_email: String,
    metrics: DeliveryMetrics,
}

impl HandlerSet {
    pub fn new(
        handlers: HandlerRegistry,
        gateway: Arc<dyn MessagingGateway>,
        support_email: impl Into<String>,
        consumer_name: &str,
    ) -> Self {
        Self {
            handlers,
            gateway,
            support_email: support_email.into(),
            metrics: DeliveryMetrics::new(consumer_name),
        }
    }

    /// Consume deliveries until the stream ends or `shutdown` flips to `true`.
    ///
    /// Returns an error if the stream ends on its own.
    pub async fn listen<D>(
        &self,
        mut deliveries: DeliveryStream<D>,
        mut shutdown: watch::Receiver<bool>,
    ) -> MessagingResult<()>
    where
        D: Delivery + 'static,
    {
        info!(
            categories = ?self.handlers.keys().collect::<Vec<_>>(),
            "Listening for deliveries"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping listener");
                        return Ok(());
                    }
                }

                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        self.handle_delivery(&delivery).await;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Failed to receive delivery");
                    }
                    None => {
                        return Err(MessagingError::receive("delivery stream closed"));
                    }
                }
            }
        }
    }

    /// Dispatch a single delivery and settle it.
    pub async fn handle_delivery(&self, delivery: &dyn Delivery) -> DeliveryOutcome {
        let start = Instant::now();
        self.metrics.received();

        let routing_key = match parse_routing_key(delivery.routing_key()) {
            Ok(key) => key,
            Err(e) => {
                error!(error = %e, "Unable to handle message");
                self.nack(delivery, false).await;
                self.metrics
                    .settled(OTHER_CATEGORY, DeliveryOutcome::Discarded, start.elapsed());
                return DeliveryOutcome::Discarded;
            }
        };

        if delivery.delivery_count() > 1 {
            debug!(
                routing_key = %delivery.routing_key(),
                delivery_count = delivery.delivery_count(),
                "Processing redelivered message"
            );
        }

        let Some(handler) = self.handlers.get(routing_key.category) else {
            info!(
                category = %routing_key.category,
                "No handler for category; ignoring delivery"
            );
            self.ack(delivery).await;
            self.metrics.settled(
                self.category_label(routing_key.category),
                DeliveryOutcome::Ignored,
                start.elapsed(),
            );
            return DeliveryOutcome::Ignored;
        };

        let outcome = match handler
            .handle_message(routing_key.update_type, delivery)
            .await
        {
            Ok(()) => {
                self.ack(delivery).await;
                DeliveryOutcome::Acked
            }
            Err(e) => self.handle_error(delivery, e).await,
        };

        let elapsed = start.elapsed();
        debug!(
            routing_key = %delivery.routing_key(),
            outcome = outcome.as_str(),
            duration_ms = elapsed.as_millis() as u64,
            "Delivery settled"
        );
        self.metrics
            .settled(self.category_label(routing_key.category), outcome, elapsed);
        outcome
    }

    /// Registered categories label themselves; anything else shares one label.
    fn category_label<'a>(&self, category: &'a str) -> &'a str {
        if self.handlers.contains_key(category) {
            category
        } else {
            OTHER_CATEGORY
        }
    }

    async fn handle_error(&self, delivery: &dyn Delivery, err: HandlerError) -> DeliveryOutcome {
        match err.kind() {
            ErrorKind::Unrecoverable => {
                error!(error = %err, "Discarding message because of an unrecoverable error");
                self.send_unrecoverable_error_email(delivery, &err).await;
                log_delivery("discarded delivery", delivery);
                self.nack(delivery, false).await;
                DeliveryOutcome::Discarded
            }
            ErrorKind::Recoverable => {
                error!(error = %err, "Requeuing message because of a recoverable error");
                log_delivery("requeued delivery", delivery);
                self.nack(delivery, true).await;
                DeliveryOutcome::Requeued
            }
            ErrorKind::PresumedRecoverable => {
                error!(
                    error = %err,
                    "Requeuing message because of an error that is presumed to be recoverable"
                );
                log_delivery("requeued delivery", delivery);
                self.nack(delivery, true).await;
                DeliveryOutcome::Requeued
            }
        }
    }

    /// Best effort: a failure here is logged and otherwise ignored.
    async fn send_unrecoverable_error_email(&self, delivery: &dyn Delivery, cause: &HandlerError) {
        let mut values = Map::new();
        values.insert("error".to_string(), Value::String(cause.to_string()));
        values.insert(
            "routing_key".to_string(),
            Value::String(delivery.routing_key().to_string()),
        );
        values.insert(
            "message_body".to_string(),
            Value::String(String::from_utf8_lossy(delivery.body()).into_owned()),
        );

        let request = EmailRequest {
            template: DISCARD_EMAIL_TEMPLATE.to_string(),
            to: self.support_email.clone(),
            subject: DISCARD_EMAIL_SUBJECT.to_string(),
            values,
        };

        if let Err(e) = self.gateway.publish_email_request(&request).await {
            error!(
                error = %e,
                "Unable to send unrecoverable error notification email request"
            );
        }
    }

    async fn ack(&self, delivery: &dyn Delivery) {
        if let Err(e) = delivery.ack().await {
            error!(error = %e, "Unable to acknowledge delivery");
            self.metrics.settle_failed();
        }
    }

    async fn nack(&self, delivery: &dyn Delivery, requeue: bool) {
        if let Err(e) = delivery.nack(requeue).await {
            error!(error = %e, requeue, "Unable to negatively acknowledge delivery");
            self.metrics.settle_failed();
        }
    }
}

fn log_delivery(description: &str, delivery: &dyn Delivery) {
    info!(
        "{}: {}; {}",
        description,
        delivery.routing_key(),
        String::from_utf8_lossy(delivery.body())
    );
}
