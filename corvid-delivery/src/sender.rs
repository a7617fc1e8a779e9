//! Sender contract for the transport layer
//!
//! The delivery core requires exactly one thing from the transport: given a
//! destination and an opaque payload, attempt a send and report what
//! happened in a structured way. Authentication, formatting, connection
//! pooling and request timeouts are all the transport's concern; the core
//! never holds a lock across [`Sender::send`].

use std::time::Duration;

use async_trait::async_trait;
use corvid_common::Destination;
use thiserror::Error;

/// What the downstream API said about a single send attempt
///
/// The provider-throttle case is deliberately not an error: it is a
/// scheduling hint, consumed without spending a retry attempt. String
/// matching on error messages to detect throttling is exactly what this
/// enum exists to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was accepted by the downstream API
    Delivered,
    /// The provider asked us to back off for the given duration
    RateLimited(Duration),
    /// The attempt failed; the queue decides whether to retry
    Failed(SendError),
}

/// A failed send attempt, classified by where it failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The request never completed (connection refused, reset, DNS, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status
    #[error("API error: {status} {message}")]
    Api { status: u16, message: String },

    /// The transport's own deadline elapsed
    #[error("Send timed out after {0} seconds")]
    Timeout(u64),
}

impl SendError {
    /// Short label for metrics and logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Api { .. } => "api",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Performs the actual network call to the downstream messaging API
///
/// Implementations must be cancellable or timeout-bounded by their own
/// transport deadline; the queue never imposes one.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Attempt to deliver `payload` to `destination`
    async fn send(&self, destination: &Destination, payload: &[u8]) -> SendOutcome;
}
