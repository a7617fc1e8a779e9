//! Metrics configuration

use serde::Deserialize;

/// Configuration for metrics collection and export
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Enable or disable metrics collection
    ///
    /// When disabled, `init_metrics` returns `None` and the pipeline runs
    /// without instrumentation.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// OTLP endpoint URL for metrics export
    ///
    /// Metrics are pushed to this OpenTelemetry Collector endpoint using
    /// OTLP over HTTP.
    ///
    /// Common values:
    /// - `http://localhost:4318/v1/metrics` (local development)
    /// - `http://otel-collector:4318/v1/metrics` (Docker Compose service name)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

const fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:4318/v1/metrics".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
        }
    }
}
