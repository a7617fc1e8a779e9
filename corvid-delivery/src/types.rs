//! Type definitions for the delivery queue and processor

use std::{cmp::Ordering, fmt, sync::Arc};

use corvid_common::Destination;
use serde::Serialize;
use tokio::time::Instant;
use ulid::Ulid;

/// Unique identifier for a queued message
///
/// Assigned at enqueue time and unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(Ulid);

impl MessageId {
    /// Generate a fresh identifier
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message waiting in the delivery queue
///
/// Created on enqueue, mutated in place on failed attempts (retry count and
/// eligibility time), and destroyed on success or once the retry budget is
/// exhausted.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    /// Unique id assigned at enqueue time
    pub id: MessageId,
    /// Routing key for the downstream API
    pub destination: Destination,
    /// Opaque content blob; never inspected by the core
    pub payload: Arc<[u8]>,
    /// Urgency; higher is dequeued first
    pub priority: i32,
    /// Number of failed send attempts so far
    pub retry_count: u32,
    /// When the message was first admitted (immutable)
    pub first_enqueued_at: Instant,
    /// The message is not a send candidate before this time
    pub next_eligible_at: Instant,
    /// Last send failure, carried into the terminal event
    pub last_error: Option<String>,
}

impl QueuedMessage {
    /// Create a new message eligible for immediate delivery
    #[must_use]
    pub fn new(destination: Destination, payload: Arc<[u8]>, priority: i32) -> Self {
        let now = Instant::now();
        Self {
            id: MessageId::new(),
            destination,
            payload,
            priority,
            retry_count: 0,
            first_enqueued_at: now,
            next_eligible_at: now,
            last_error: None,
        }
    }
}

// Total order over the queue: priority descending, then fresh messages
// before already-retried ones, then FIFO, with the id as a deterministic
// final tie-break. `BinaryHeap` is a max-heap, so "greater" means
// "dequeued first".
impl Ord for QueuedMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.retry_count.cmp(&self.retry_count))
            .then_with(|| other.first_enqueued_at.cmp(&self.first_enqueued_at))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for QueuedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedMessage {}

/// Snapshot of the queue state, for control surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Number of messages currently waiting
    pub queue_length: usize,
    /// Whether a send is currently in flight
    pub is_processing: bool,
    /// Whether the loop is paused
    pub is_paused: bool,
}
