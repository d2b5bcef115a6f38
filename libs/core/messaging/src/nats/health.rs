//! Health endpoints for K8s probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Health status reported by the probes.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub bus_connected: bool,
    pub listener_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Shared health state.
#[derive(Clone)]
pub struct HealthState {
    inner: Arc<RwLock<HealthStateInner>>,
}

struct HealthStateInner {
    bus_connected: bool,
    listener_running: bool,
    last_error: Option<String>,
}

impl HealthState {
    /// Create new health state. Nothing is ready until the listener starts.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthStateInner {
                bus_connected: false,
                listener_running: false,
                last_error: None,
            })),
        }
    }

    /// Mark the bus connection state.
    pub async fn set_bus_connected(&self, connected: bool) {
        self.inner.write().await.bus_connected = connected;
    }

    /// Mark whether the delivery listener is running.
    pub async fn set_listener_running(&self, running: bool) {
        self.inner.write().await.listener_running = running;
    }

    /// Record the most recent fatal error.
    pub async fn set_error(&self, error: Option<String>) {
        self.inner.write().await.last_error = error;
    }

    /// Liveness: the process has not hit a fatal error.
    pub async fn is_alive(&self) -> bool {
        self.inner.read().await.last_error.is_none()
    }

    /// Readiness: connected to the bus and consuming deliveries.
    pub async fn is_ready(&self) -> bool {
        let inner = self.inner.read().await;
        inner.bus_connected && inner.listener_running && inner.last_error.is_none()
    }

    /// Snapshot of the current status.
    pub async fn status(&self) -> HealthStatus {
        let inner = self.inner.read().await;
        let status = match (&inner.last_error, inner.bus_connected && inner.listener_running) {
            (Some(_), _) => "unhealthy",
            (None, true) => "healthy",
            (None, false) => "starting",
        };

        HealthStatus {
            status: status.to_string(),
            bus_connected: inner.bus_connected,
            listener_running: inner.listener_running,
            last_error: inner.last_error.clone(),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health server for K8s probes.
pub struct HealthServer {
    port: u16,
    state: HealthState,
    metrics_handle: Option<PrometheusHandle>,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            state: HealthState::new(),
            metrics_handle: None,
        }
    }

    /// Set the metrics handle for the /metrics endpoint.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Get the health state for updates.
    pub fn state(&self) -> HealthState {
        self.state.clone()
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/readyz", get(ready_handler))
            .with_state(self.state.clone());

        if let Some(handle) = self.metrics_handle.clone() {
            router = router.route(
                "/metrics",
                get(move || {
                    let handle = handle.clone();
                    async move { handle.render() }
                }),
            );
        }

        router
    }

    /// Run the health server.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let router = self.router();
        let addr = format!("0.0.0.0:{}", self.port);

        info!(addr = %addr, "Starting health server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let code = if state.is_alive().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(state.status().await))
}

async fn ready_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let code = if state.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(state.status().await))
}
