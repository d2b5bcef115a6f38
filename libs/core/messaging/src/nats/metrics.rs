//! Prometheus metrics for delivery handling.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Handled successfully and acknowledged
    Acked,
    /// No handler registered, acknowledged without processing
    Ignored,
    /// Recoverable failure, returned to the bus
    Requeued,
    /// Unrecoverable failure, discarded
    Discarded,
}

impl DeliveryOutcome {
    /// Label value for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Acked => "acked",
            DeliveryOutcome::Ignored => "ignored",
            DeliveryOutcome::Requeued => "requeued",
            DeliveryOutcome::Discarded => "discarded",
        }
    }
}

/// Metrics recorded per delivery.
#[derive(Clone)]
pub struct DeliveryMetrics {
    consumer_name: String,
}

impl DeliveryMetrics {
    /// Create new metrics labelled with the consumer name.
    pub fn new(consumer_name: &str) -> Self {
        Self {
            consumer_name: consumer_name.to_string(),
        }
    }

    /// Record a delivery received.
    pub fn received(&self) {
        counter!(
            "event_recorder_deliveries_received_total",
            "consumer" => self.consumer_name.clone()
        )
        .increment(1);
    }

    /// Record how a delivery was settled and how long it took.
    ///
    /// `category` becomes a label value, so callers must keep it to a bounded set.
    pub fn settled(&self, category: &str, outcome: DeliveryOutcome, duration: Duration) {
        counter!(
            "event_recorder_deliveries_total",
            "consumer" => self.consumer_name.clone(),
            "category" => category.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        histogram!(
            "event_recorder_delivery_duration_seconds",
            "consumer" => self.consumer_name.clone(),
            "category" => category.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a failed acknowledgement.
    pub fn settle_failed(&self) {
        counter!(
            "event_recorder_settle_failures_total",
            "consumer" => self.consumer_name.clone()
        )
        .increment(1);
    }
}

/// Initialize Prometheus metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
