//! Terminal delivery events
//!
//! The enqueuer is long gone by the time a message resolves, so terminal
//! outcomes are surfaced as events instead of return values. Handlers are
//! an explicit ordered list passed at construction and invoked
//! synchronously from the processing loop; there is no hidden registry.

use corvid_common::Destination;

use crate::types::MessageId;

/// A terminal outcome for a queued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// The message was accepted by the downstream API
    Delivered {
        id: MessageId,
        destination: Destination,
        /// Failed attempts before the successful one
        retries: u32,
    },

    /// The message exhausted its retry budget and was dropped
    PermanentFailure {
        id: MessageId,
        destination: Destination,
        /// Total send attempts made
        attempts: u32,
        /// The error from the final attempt
        error: String,
    },
}

/// Observer for terminal delivery events
///
/// Handlers run synchronously on the processing loop; keep them cheap and
/// never block in them.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &DeliveryEvent);
}
