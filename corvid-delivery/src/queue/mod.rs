//! Delivery queue management
//!
//! A bounded, priority-ordered, in-memory collection of pending messages.
//! The queue is a cloneable handle over shared state: any number of
//! producers may enqueue concurrently, while a single processing loop
//! (driven by [`crate::DeliveryProcessor`]) drains it. All state is
//! process-local; a restart loses queued messages.

use std::{
    collections::BinaryHeap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use corvid_common::Destination;
use corvid_metrics::DeliveryMetrics;
use tokio::{sync::Notify, time::Instant};
use tracing::debug;

use crate::{
    error::EnqueueError,
    types::{MessageId, QueueStatus, QueuedMessage},
};

/// Result of asking the queue for the next send candidate
#[derive(Debug)]
pub(crate) enum PopOutcome {
    /// The head message is eligible and has been removed
    Ready(QueuedMessage),
    /// The head message exists but is not eligible before this time
    NotBefore(Instant),
    /// Nothing queued
    Empty,
}

#[derive(Debug)]
struct Shared {
    heap: parking_lot::Mutex<BinaryHeap<QueuedMessage>>,
    capacity: usize,
    /// Wakes the processing loop on enqueue/resume/clear
    notify: Notify,
    paused: AtomicBool,
    processing: AtomicBool,
    metrics: Option<Arc<DeliveryMetrics>>,
}

/// Bounded priority queue of messages awaiting delivery
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    shared: Arc<Shared>,
}

impl DeliveryQueue {
    /// Create an empty queue with the given capacity
    #[must_use]
    pub fn new(capacity: usize, metrics: Option<Arc<DeliveryMetrics>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                heap: parking_lot::Mutex::new(BinaryHeap::new()),
                capacity,
                notify: Notify::new(),
                paused: AtomicBool::new(false),
                processing: AtomicBool::new(false),
                metrics,
            }),
        }
    }

    /// Admit a message to the queue
    ///
    /// The returned id is unique for the lifetime of the process. Wakes the
    /// processing loop if it is idle.
    ///
    /// # Errors
    ///
    /// Returns [`EnqueueError::QueueFull`] when the queue is at capacity;
    /// the producer must apply its own backpressure.
    pub fn enqueue(
        &self,
        destination: Destination,
        payload: impl Into<Arc<[u8]>>,
        priority: i32,
    ) -> Result<MessageId, EnqueueError> {
        let message = QueuedMessage::new(destination, payload.into(), priority);
        let id = message.id;
        let destination = message.destination.clone();

        {
            let mut heap = self.shared.heap.lock();
            if heap.len() >= self.shared.capacity {
                return Err(EnqueueError::QueueFull {
                    capacity: self.shared.capacity,
                });
            }
            heap.push(message);
            self.sync_gauge(heap.len());
        }

        if let Some(metrics) = &self.shared.metrics {
            metrics.record_queued(destination.as_str());
        }

        debug!(message_id = %id, destination = %destination, priority, "Message queued");
        self.shared.notify.notify_one();

        Ok(id)
    }

    /// Put a message back after a deferred or failed attempt
    ///
    /// Deliberately skips the capacity check: the message was already
    /// admitted once and dropping it here would violate at-least-once.
    ///
    /// Does not notify. Only the processing loop requeues, and it always
    /// rechecks the heap itself; a self-notification here would wake its
    /// own gate waits immediately.
    pub(crate) fn requeue(&self, message: QueuedMessage) {
        let mut heap = self.shared.heap.lock();
        heap.push(message);
        self.sync_gauge(heap.len());
    }

    /// Remove and return the head message if it is eligible at `now`
    pub(crate) fn pop_ready(&self, now: Instant) -> PopOutcome {
        let mut heap = self.shared.heap.lock();
        match heap.peek() {
            None => PopOutcome::Empty,
            Some(head) if head.next_eligible_at > now => PopOutcome::NotBefore(head.next_eligible_at),
            Some(_) => match heap.pop() {
                Some(message) => {
                    self.sync_gauge(heap.len());
                    PopOutcome::Ready(message)
                }
                None => PopOutcome::Empty,
            },
        }
    }

    /// Stop the loop from dequeuing; messages keep accumulating
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    /// Restart the loop after a pause
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.notify.notify_one();
    }

    /// Drop every queued message
    pub fn clear(&self) {
        let mut heap = self.shared.heap.lock();
        heap.clear();
        self.sync_gauge(0);
    }

    /// Number of messages currently waiting
    pub fn len(&self) -> usize {
        self.shared.heap.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.shared.heap.lock().is_empty()
    }

    /// Whether the loop is paused
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Snapshot for control surfaces
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.len(),
            is_processing: self.shared.processing.load(Ordering::SeqCst),
            is_paused: self.is_paused(),
        }
    }

    pub(crate) fn set_processing(&self, processing: bool) {
        self.shared.processing.store(processing, Ordering::SeqCst);
    }

    /// Wait for the next enqueue/resume wakeup
    pub(crate) async fn notified(&self) {
        self.shared.notify.notified().await;
    }

    fn sync_gauge(&self, len: usize) {
        if let Some(metrics) = &self.shared.metrics {
            metrics.set_queue_length(len as u64);
        }
    }
}
