//! Sliding-window rate limiting for the downstream API
//!
//! The provider expresses its limit as "at most N sends per T milliseconds"
//! with a wholesale window reset, so this is a fixed window counter rather
//! than a smooth token bucket: the window resets entirely once its duration
//! has elapsed, exactly matching the provider's accounting.
//!
//! # Example
//!
//! ```text
//! Limit: 2 sends per 1000 ms
//! t=0ms:    send, send        (count 2/2)
//! t=400ms:  blocked           (600 ms until the window resets)
//! t=1000ms: window resets, 2 more sends allowed
//! ```
//!
//! No retry or backoff logic lives here; the window is a pure counter owned
//! exclusively by the processing loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tokio::time::Instant;

/// Configuration for the sliding window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateWindowConfig {
    /// Window duration in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum sends permitted within one window
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,
}

impl Default for RateWindowConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_per_window: default_max_per_window(),
        }
    }
}

const fn default_window_ms() -> u64 {
    60_000
}

const fn default_max_per_window() -> u32 {
    30
}

/// Counts sends within the current window
#[derive(Debug)]
pub struct RateWindow {
    /// Start of the current counting interval
    window_start: Instant,
    /// Sends performed since `window_start`
    count_in_window: u32,
    /// Window duration
    window: Duration,
    /// Maximum sends per window
    max_per_window: u32,
}

impl RateWindow {
    /// Create a new window starting now
    #[must_use]
    pub fn new(config: &RateWindowConfig) -> Self {
        Self {
            window_start: Instant::now(),
            count_in_window: 0,
            window: Duration::from_millis(config.window_ms),
            max_per_window: config.max_per_window,
        }
    }

    /// Reset the window if its duration has elapsed
    fn roll(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.count_in_window = 0;
        }
    }

    /// Try to claim a send slot
    ///
    /// Returns `true` and increments the count iff a slot is free in the
    /// current window; `false` without mutation otherwise.
    pub fn try_reserve(&mut self) -> bool {
        self.roll();

        if self.count_in_window < self.max_per_window {
            self.count_in_window += 1;
            true
        } else {
            false
        }
    }

    /// Time until a send slot becomes available
    ///
    /// Zero if a slot is free now, otherwise the remaining time until the
    /// window resets.
    pub fn time_until_next_slot(&mut self) -> Duration {
        self.roll();

        if self.count_in_window < self.max_per_window {
            return Duration::ZERO;
        }

        (self.window_start + self.window).saturating_duration_since(Instant::now())
    }

    /// Sends recorded in the current window
    #[must_use]
    pub const fn count_in_window(&self) -> u32 {
        self.count_in_window
    }
}
