//! Delivery pipeline metrics
//!
//! Tracks outbound message delivery including:
//! - Admission, send, retry and drop counters by destination
//! - Send durations and time spent waiting in the queue
//! - Current queue length

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

/// Delivery metrics collector
///
/// Instruments are created on the global meter provider; the struct itself
/// is an explicit handle passed to the components that record into it.
#[derive(Debug)]
pub struct DeliveryMetrics {
    /// Total number of messages admitted to the queue
    queued: Counter<u64>,

    /// Total number of messages delivered successfully
    sent: Counter<u64>,

    /// Total number of messages dropped after exhausting retries
    failed: Counter<u64>,

    /// Total number of provider throttle responses
    rate_limited: Counter<u64>,

    /// Total number of retry reschedules after a send failure
    retried: Counter<u64>,

    /// Distribution of send durations by destination
    send_duration_seconds: Histogram<f64>,

    /// Distribution of time between enqueue and each send attempt
    queue_wait_seconds: Histogram<f64>,

    /// Backing value for the queue length observable gauge
    queue_length: Arc<AtomicU64>,
}

impl Default for DeliveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryMetrics {
    /// Create a new delivery metrics collector
    #[must_use]
    pub fn new() -> Self {
        let meter = meter();

        let queued = meter
            .u64_counter("corvid.delivery.queued.total")
            .with_description("Total number of messages admitted to the queue")
            .build();

        let sent = meter
            .u64_counter("corvid.delivery.sent.total")
            .with_description("Total number of messages delivered successfully")
            .build();

        let failed = meter
            .u64_counter("corvid.delivery.failed.total")
            .with_description("Total number of messages dropped after exhausting retries")
            .build();

        let rate_limited = meter
            .u64_counter("corvid.delivery.rate_limited.total")
            .with_description("Total number of provider throttle responses")
            .build();

        let retried = meter
            .u64_counter("corvid.delivery.retried.total")
            .with_description("Total number of retry reschedules after a send failure")
            .build();

        let send_duration_seconds = meter
            .f64_histogram("corvid.delivery.send.duration.seconds")
            .with_description("Distribution of send durations by destination")
            .build();

        let queue_wait_seconds = meter
            .f64_histogram("corvid.delivery.queue.wait.seconds")
            .with_description("Distribution of time between enqueue and each send attempt")
            .build();

        let queue_length = Arc::new(AtomicU64::new(0));

        // Observable gauge reading from the shared atomic; the meter keeps
        // the callback alive internally.
        let length = queue_length.clone();
        meter
            .u64_observable_gauge("corvid.delivery.queue.length")
            .with_description("Current number of messages waiting in the queue")
            .with_callback(move |observer| {
                observer.observe(length.load(Ordering::Relaxed), &[]);
            })
            .build();

        Self {
            queued,
            sent,
            failed,
            rate_limited,
            retried,
            send_duration_seconds,
            queue_wait_seconds,
            queue_length,
        }
    }

    /// Record a message admitted to the queue
    pub fn record_queued(&self, destination: &str) {
        self.queued
            .add(1, &[KeyValue::new("destination", destination.to_string())]);
    }

    /// Record a successful delivery
    pub fn record_sent(&self, destination: &str, duration_secs: f64) {
        let attributes = [KeyValue::new("destination", destination.to_string())];
        self.sent.add(1, &attributes);
        self.send_duration_seconds
            .record(duration_secs, &attributes);
    }

    /// Record a permanently failed (dropped) message
    pub fn record_failed(&self, destination: &str, reason: &str) {
        self.failed.add(
            1,
            &[
                KeyValue::new("destination", destination.to_string()),
                KeyValue::new("reason", reason.to_string()),
            ],
        );
    }

    /// Record a provider throttle response
    pub fn record_rate_limited(&self, destination: &str) {
        self.rate_limited
            .add(1, &[KeyValue::new("destination", destination.to_string())]);
    }

    /// Record a retry reschedule
    pub fn record_retried(&self, destination: &str) {
        self.retried
            .add(1, &[KeyValue::new("destination", destination.to_string())]);
    }

    /// Record how long a message waited in the queue before a send attempt
    pub fn record_queue_wait(&self, wait_secs: f64) {
        self.queue_wait_seconds.record(wait_secs, &[]);
    }

    /// Set the current queue length gauge
    pub fn set_queue_length(&self, length: u64) {
        self.queue_length.store(length, Ordering::Relaxed);
    }

    /// Get the last reported queue length
    #[must_use]
    pub fn queue_length(&self) -> u64 {
        self.queue_length.load(Ordering::Relaxed)
    }
}

/// Get the OpenTelemetry meter for delivery metrics
fn meter() -> Meter {
    opentelemetry::global::meter("corvid.delivery")
}
