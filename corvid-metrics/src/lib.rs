//! OpenTelemetry metrics for the corvid delivery pipeline
//!
//! Exports metrics via OTLP to an OpenTelemetry Collector, which can expose
//! them in Prometheus format for scraping.
//!
//! # Architecture
//!
//! ```text
//! corvid → OTLP/HTTP → OpenTelemetry Collector → Prometheus (scrape) → Grafana
//! ```
//!
//! The metrics handle is built once at process start and threaded through
//! constructors; there is no ambient global instance.
//!
//! # Usage
//!
//! ```rust,no_run
//! use corvid_metrics::{MetricsConfig, init_metrics};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MetricsConfig {
//!     enabled: true,
//!     endpoint: "http://localhost:4318/v1/metrics".to_string(),
//! };
//!
//! // `None` when metrics are disabled; otherwise pass the handle to the
//! // delivery processor at construction.
//! let metrics = init_metrics(&config)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod delivery;
mod error;
mod exporter;

use std::sync::Arc;

pub use config::MetricsConfig;
pub use delivery::DeliveryMetrics;
pub use error::MetricsError;

/// Initialize the metrics system and build the delivery instruments
///
/// Installs the OTLP exporter as the global meter provider and returns the
/// instrument handle to pass to the processor. Returns `None` when metrics
/// are disabled in the config.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be initialized.
pub fn init_metrics(config: &MetricsConfig) -> Result<Option<Arc<DeliveryMetrics>>, MetricsError> {
    if !config.enabled {
        tracing::info!("Metrics collection is disabled");
        return Ok(None);
    }

    tracing::info!(
        endpoint = %config.endpoint,
        "Initializing OpenTelemetry metrics with OTLP exporter"
    );

    let provider = exporter::init_otlp_exporter(config.endpoint.clone())?;
    opentelemetry::global::set_meter_provider(provider);

    let delivery = DeliveryMetrics::new();

    tracing::info!("Metrics collection initialized successfully");

    Ok(Some(Arc::new(delivery)))
}
