use crate::Environment;
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install color-eyre with a project-standard configuration.
///
/// Call this early in main() before any fallible operations. Safe to call
/// multiple times.
///
/// Configuration:
/// - Shows file:line where errors occur
/// - Hides environment variables (less noise)
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Initialize tracing with environment-aware configuration and error span capture.
///
/// - **Production** (`APP_ENV=production`): JSON lines with flattened event
///   fields, `info` by default
/// - **Development** (default): pretty-printed output, `debug` for the service
///   crates and quieter driver crates
///
/// `RUST_LOG` overrides either default (e.g. `domain_notifications=trace`).
///
/// Safe to call multiple times: if a subscriber is already installed (common in
/// tests) this silently continues.
pub fn init_tracing(environment: &Environment) {
    let is_production = environment.is_production();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production {
            EnvFilter::new("info,sea_orm=warn,sqlx=warn,async_nats=warn")
        } else {
            EnvFilter::new("debug,sea_orm=info,sqlx=warn,async_nats=info,hyper=info")
        }
    });

    let result = if is_production {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(_) => {
            info!(environment = ?environment, "Tracing initialized");
        }
        Err(_) => {
            debug!("Tracing already initialized, skipping re-initialization");
        }
    }
}
