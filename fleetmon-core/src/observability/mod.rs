//! Observability infrastructure: tracing and metrics.

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Initialize the global observability infrastructure.
///
/// This must be called once at application startup before any other
/// operations. The Prometheus exporter serves `/metrics` on the given port.
///
/// # Panics
/// Panics if called more than once.
pub fn init(metrics_port: u16) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .init();

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics_port))
        .install()?;

    metrics::register_core_metrics();

    tracing::info!("Observability initialized (metrics on port {})", metrics_port);
    Ok(())
}
