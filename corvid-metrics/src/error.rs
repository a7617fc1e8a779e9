//! Error types for metrics operations

use thiserror::Error;

/// Errors that can occur during metrics operations
#[derive(Debug, Error)]
pub enum MetricsError {
    /// OpenTelemetry SDK error
    #[error("OpenTelemetry error: {0}")]
    OpenTelemetry(String),

    /// I/O error while setting up the exporter
    #[error("Exporter I/O error: {0}")]
    Io(#[from] std::io::Error),
}
