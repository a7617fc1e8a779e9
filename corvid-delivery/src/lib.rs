//! Outbound delivery core for the corvid relay
//!
//! This crate provides the machinery that stands between event producers
//! and a rate-limited downstream messaging API:
//! - A bounded, priority-ordered in-memory queue with a single send loop
//! - A sliding-window rate limiter matching "N sends per T ms" provider limits
//! - Exponential-backoff retries with a bounded attempt budget
//! - A per-destination circuit breaker that stops hammering a failing API
//!
//! Payloads are opaque; transport, formatting and upstream ingestion are
//! the caller's concern, plugged in through the [`Sender`] trait.

mod circuit_breaker;
mod error;
mod event;
mod policy;
mod processor;
pub mod queue;
mod rate_window;
mod sender;
mod types;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
// Re-export common types
pub use corvid_common::Destination;
pub use error::{DeliveryError, EnqueueError};
pub use event::{DeliveryEvent, EventHandler};
pub use policy::RetryPolicy;
pub use processor::DeliveryProcessor;
pub use queue::DeliveryQueue;
pub use rate_window::{RateWindow, RateWindowConfig};
pub use sender::{SendError, SendOutcome, Sender};
pub use types::{MessageId, QueueStatus, QueuedMessage};
