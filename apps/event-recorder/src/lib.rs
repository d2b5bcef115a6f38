//! Event Recorder Service
//!
//! Consumes update events from NATS JetStream, records notifications in
//! Postgres and republishes them to the UI with the user's unread count.
//!
//! ## Architecture
//!
//! ```text
//! NATS JetStream (EVENTS stream, events.*.update.*)
//!   ↓ (Pull Consumer: event_listener)
//! HandlerSet
//!   ↓ (category "notification")
//! LegacyHandler ──→ Postgres (notifications, users, notification_types)
//!   ↓
//! email.requests / notification.<user>
//! ```
//!
//! Unrecoverable deliveries are discarded and reported to the support address;
//! everything else is returned to the stream for redelivery.

pub mod config;

use crate::config::RecorderConfig;
use core_config::{Environment, FromEnv};
use domain_notifications::{init_message_handlers, HandlerSet, NatsGateway, PgStore};
use eyre::{Result, WrapErr};
use messaging::nats::{
    init_metrics, ConsumerConfig, HealthServer, NatsConsumer, NatsPublisher, StreamStorage,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Run the event recorder until shutdown or a fatal error.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, the database or NATS is
/// unreachable, or the delivery stream ends unexpectedly.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let metrics_handle = init_metrics().wrap_err("Failed to install metrics recorder")?;

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "Starting event recorder"
    );
    info!("Environment: {:?}", environment);

    let config = RecorderConfig::from_env().wrap_err("Invalid configuration")?;

    let health_server = HealthServer::new(config.health_port).with_metrics(metrics_handle);
    let health = health_server.state();
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            error!(error = %e, "Health server failed");
        }
    });

    let db = connect_database(&config).await?;
    let store = Arc::new(PgStore::new(db));

    info!(url = %config.nats.url, "Connecting to NATS...");
    let nats_client = async_nats::connect(&config.nats.url)
        .await
        .wrap_err_with(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS successfully");

    let storage: StreamStorage = config
        .nats
        .storage
        .parse()
        .map_err(|e: String| eyre::eyre!(e))?;
    let consumer_config = ConsumerConfig::new(&config.nats.stream)
        .with_storage(storage)
        .with_durable_name(&config.nats.consumer);

    let jetstream = async_nats::jetstream::new(nats_client.clone());
    let consumer = NatsConsumer::new(jetstream, consumer_config);
    consumer
        .init()
        .await
        .wrap_err("Failed to initialize the events stream and consumer")?;
    health.set_bus_connected(true).await;

    let gateway = Arc::new(NatsGateway::new(
        NatsPublisher::new(nats_client),
        &config.email_request_subject,
        &config.notification_subject_prefix,
    ));
    let handlers = init_message_handlers(store, gateway.clone());
    let handler_set = HandlerSet::new(
        handlers,
        gateway,
        &config.support_email,
        consumer.durable_name(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let deliveries = consumer
        .deliveries()
        .await
        .wrap_err("Failed to open the delivery stream")?;

    health.set_listener_running(true).await;
    let result = handler_set.listen(deliveries, shutdown_rx).await;
    health.set_listener_running(false).await;

    if let Err(e) = result {
        health.set_error(Some(e.to_string())).await;
        return Err(e).wrap_err("Listener stopped");
    }

    info!("Event recorder stopped");
    Ok(())
}

/// Open the connection pool, applying migrations when configured.
async fn connect_database(config: &RecorderConfig) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.database.url.clone());
    options
        .max_connections(config.database.max_connections)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .wrap_err("Failed to connect to the database")?;
    info!("Successfully connected to PostgreSQL database");

    if config.database.run_migrations {
        Migrator::up(&db, None)
            .await
            .wrap_err("Failed to run database migrations")?;
        info!("Database migrations applied");
    }

    Ok(db)
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}
