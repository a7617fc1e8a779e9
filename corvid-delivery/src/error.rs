//! Typed error handling for the delivery core
//!
//! Only queue-admission failures propagate synchronously to producers.
//! Per-message send failures are handled inside the loop (retry, metric,
//! terminal event) and never surface as errors to the enqueuer.

use thiserror::Error;

/// Errors returned synchronously from `enqueue`
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity; the producer must apply its own
    /// backpressure (drop, block, or surface upstream).
    #[error("Delivery queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

/// Errors from driving the delivery processor itself
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// `init()` was not called before `serve()`
    #[error("Delivery processor not initialized: {0}")]
    NotInitialized(String),

    /// A second `serve()` was started on the same processor
    #[error("Delivery processor is already running")]
    AlreadyRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_display() {
        let err = EnqueueError::QueueFull { capacity: 100 };
        assert_eq!(err.to_string(), "Delivery queue is full (capacity 100)");
    }
}
