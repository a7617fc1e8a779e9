//! Delivery processor orchestration
//!
//! The processor owns the single processing loop: it dequeues the highest
//! priority eligible message, gates it through the rate window and the
//! destination's circuit breaker, and hands it to [`deliver`] for the
//! actual send. Exactly one message is in flight at any time.

pub(crate) mod deliver;

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use corvid_common::{Signal, internal};
use corvid_metrics::DeliveryMetrics;
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    error::DeliveryError,
    event::{DeliveryEvent, EventHandler},
    policy::RetryPolicy,
    queue::{DeliveryQueue, PopOutcome},
    rate_window::{RateWindow, RateWindowConfig},
    sender::Sender,
    types::QueuedMessage,
};

const fn default_max_queue_size() -> usize {
    1000
}

/// Processor for delivering queued messages to the downstream API
///
/// Deserialized from configuration, then wired to its runtime
/// collaborators with [`DeliveryProcessor::init`] before [`serve`] is
/// called.
///
/// [`serve`]: DeliveryProcessor::serve
#[derive(Deserialize)]
pub struct DeliveryProcessor {
    /// Maximum number of messages admitted to the queue
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Sliding-window rate limit for the downstream API
    #[serde(default)]
    pub rate_window: RateWindowConfig,

    /// Retry and backoff policy for failed sends
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Per-destination circuit breaker thresholds
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// The delivery queue (initialized in `init()`)
    #[serde(skip)]
    queue: Option<DeliveryQueue>,

    /// Per-destination breakers (initialized in `init()`)
    #[serde(skip)]
    breaker: Option<Arc<CircuitBreaker>>,

    /// Transport for the actual sends (initialized in `init()`)
    #[serde(skip)]
    sender: Option<Arc<dyn Sender>>,

    /// Observers for terminal delivery outcomes
    #[serde(skip)]
    handlers: Vec<Arc<dyn EventHandler>>,

    /// Metrics handle, absent when metrics are disabled
    #[serde(skip)]
    metrics: Option<Arc<DeliveryMetrics>>,

    /// Guards against two `serve()` loops on the same processor
    #[serde(skip)]
    running: AtomicBool,
}

impl Default for DeliveryProcessor {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            rate_window: RateWindowConfig::default(),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            queue: None,
            breaker: None,
            sender: None,
            handlers: Vec::new(),
            metrics: None,
            running: AtomicBool::new(false),
        }
    }
}

impl fmt::Debug for DeliveryProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryProcessor")
            .field("max_queue_size", &self.max_queue_size)
            .field("rate_window", &self.rate_window)
            .field("retry", &self.retry)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("handlers", &self.handlers.len())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl DeliveryProcessor {
    /// Initialize the delivery processor
    ///
    /// Builds the queue and circuit breakers from the configured limits
    /// and wires in the transport, event handlers and metrics. Must be
    /// called before [`DeliveryProcessor::serve`].
    pub fn init(
        &mut self,
        sender: Arc<dyn Sender>,
        handlers: Vec<Arc<dyn EventHandler>>,
        metrics: Option<Arc<DeliveryMetrics>>,
    ) {
        internal!("Initialising delivery processor ...");
        internal!(
            "Rate window: {} sends per {}ms, retry budget: {} attempts, breaker threshold: {}",
            self.rate_window.max_per_window,
            self.rate_window.window_ms,
            self.retry.max_attempts,
            self.circuit_breaker.failure_threshold
        );

        self.queue = Some(DeliveryQueue::new(self.max_queue_size, metrics.clone()));
        self.breaker = Some(Arc::new(CircuitBreaker::new(self.circuit_breaker.clone())));
        self.sender = Some(sender);
        self.handlers = handlers;
        self.metrics = metrics;
    }

    /// Handle to the delivery queue, for producers and control surfaces
    ///
    /// # Errors
    ///
    /// Returns an error if [`DeliveryProcessor::init`] has not been called.
    pub fn queue(&self) -> Result<DeliveryQueue, DeliveryError> {
        self.queue.clone().ok_or_else(|| {
            DeliveryError::NotInitialized(
                "Delivery processor not initialized. Call init() first.".to_string(),
            )
        })
    }

    /// Circuit breaker state, for control surfaces
    #[must_use]
    pub fn breaker(&self) -> Option<Arc<CircuitBreaker>> {
        self.breaker.clone()
    }

    /// Run the delivery loop until a shutdown signal is received
    ///
    /// The loop dequeues one eligible message at a time, gates it through
    /// the rate window and circuit breaker, and performs the send. A send
    /// that is in flight when shutdown arrives is allowed to complete;
    /// messages still queued at shutdown are dropped with the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor was never initialized or if a
    /// serve loop is already running.
    pub async fn serve(
        &self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), DeliveryError> {
        let Some(queue) = &self.queue else {
            return Err(DeliveryError::NotInitialized(
                "Delivery processor not initialized. Call init() first.".to_string(),
            ));
        };
        let Some(sender) = &self.sender else {
            return Err(DeliveryError::NotInitialized(
                "No sender configured. Call init() first.".to_string(),
            ));
        };
        let Some(breaker) = &self.breaker else {
            return Err(DeliveryError::NotInitialized(
                "No circuit breaker configured. Call init() first.".to_string(),
            ));
        };

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DeliveryError::AlreadyRunning);
        }

        internal!("Delivery processor starting");

        // The window is owned exclusively by this loop; no lock needed.
        let mut window = RateWindow::new(&self.rate_window);

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Delivery processor received shutdown signal");
                            break;
                        }
                        Err(err) => {
                            error!("Delivery processor shutdown channel error: {err}");
                            break;
                        }
                    }
                }
                // The send itself happens in the arm body, not in the
                // raced future, so an in-flight send always completes
                // before a shutdown signal is observed.
                message = next_message(queue, breaker, &mut window) => {
                    deliver::deliver(self, queue, sender.as_ref(), breaker, message).await;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        internal!("Delivery processor shutdown complete");

        Ok(())
    }

    fn dispatch(&self, event: &DeliveryEvent) {
        for handler in &self.handlers {
            handler.handle(event);
        }
    }
}

/// Wait until a message is eligible, rate-window clear and breaker-allowed
///
/// The head message is popped before the gate checks and requeued when a
/// gate defers it, so a message is never held across an await point: every
/// message is either in the heap or in the caller's hands.
async fn next_message(
    queue: &DeliveryQueue,
    breaker: &CircuitBreaker,
    window: &mut RateWindow,
) -> QueuedMessage {
    loop {
        if queue.is_paused() {
            queue.notified().await;
            continue;
        }

        let message = match queue.pop_ready(tokio::time::Instant::now()) {
            PopOutcome::Empty => {
                queue.notified().await;
                continue;
            }
            PopOutcome::NotBefore(at) => {
                // A higher-priority enqueue can preempt the head's backoff.
                tokio::select! {
                    () = tokio::time::sleep_until(at) => {}
                    () = queue.notified() => {}
                }
                continue;
            }
            PopOutcome::Ready(message) => message,
        };

        // Window check first, without consuming: a slot counts sends,
        // and nothing has been sent yet.
        let wait = window.time_until_next_slot();
        if !wait.is_zero() {
            debug!(
                message_id = %message.id,
                destination = %message.destination,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Rate window exhausted, deferring"
            );
            queue.requeue(message);
            tokio::time::sleep(wait).await;
            continue;
        }

        // A breaker denial must not have consumed a window slot, and a
        // granted half-open probe must always reach the send.
        if !breaker.allow(&message.destination) {
            let wait = breaker.time_until_probe(&message.destination);
            debug!(
                message_id = %message.id,
                destination = %message.destination,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Circuit open, deferring"
            );
            queue.requeue(message);
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = queue.notified() => {}
            }
            continue;
        }

        // The slot is consumed here, immediately before the send. The
        // window is owned by this loop and nothing has awaited since
        // the free-slot check, so the reserve cannot fail.
        let reserved = window.try_reserve();
        debug_assert!(reserved);

        return message;
    }
}
