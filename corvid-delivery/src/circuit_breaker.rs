//! Per-destination circuit breaker to stop hammering a failing API
//!
//! The breaker has three states per destination key:
//! - **Closed**: normal operation; consecutive failures accumulate
//! - **Open**: sends rejected outright until the reset timeout elapses
//! - **Half-open**: exactly one trial send is permitted to probe recovery
//!
//! # State transitions
//!
//! ```text
//! Closed --[failures >= threshold]--> Open
//! Open   --[reset timeout elapsed, probe granted]--> HalfOpen
//! HalfOpen --[probe succeeds]--> Closed
//! HalfOpen --[probe fails]--> Open (timer restarted)
//! ```
//!
//! Granting the probe is a side effect of `allow`: the first caller after
//! the timeout gets `true` and owns the probe; concurrent callers get
//! `false` until the probe resolves via `record_success`/`record_failure`.

use std::{sync::Arc, time::Duration};

use corvid_common::Destination;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe is allowed (ms)
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_reset_timeout_ms() -> u64 {
    30_000
}

/// Observable circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    /// Entered only by granting the probe, so one is always outstanding.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerData {
    state: State,
}

impl BreakerData {
    const fn new() -> Self {
        Self {
            state: State::Closed { failures: 0 },
        }
    }

    fn allow(&mut self, destination: &Destination, reset_timeout: Duration) -> bool {
        match &mut self.state {
            State::Closed { .. } => true,
            State::Open { opened_at } => {
                if Instant::now() >= *opened_at + reset_timeout {
                    self.state = State::HalfOpen;
                    info!(
                        destination = %destination,
                        "Circuit breaker half-open, granting trial send"
                    );
                    true
                } else {
                    false
                }
            }
            // The probe is still in flight; it resolves via record_*.
            State::HalfOpen => false,
        }
    }

    fn record_success(&mut self, destination: &Destination) {
        match self.state {
            State::Closed { .. } => {
                self.state = State::Closed { failures: 0 };
            }
            State::HalfOpen => {
                self.state = State::Closed { failures: 0 };
                info!(
                    destination = %destination,
                    "Circuit breaker closed, normal operation resumed"
                );
            }
            State::Open { .. } => {
                // Sends are rejected while open; a stray success is stale.
                warn!(
                    destination = %destination,
                    "Unexpected success while circuit is open"
                );
            }
        }
    }

    fn record_failure(&mut self, destination: &Destination, threshold: u32) {
        match self.state {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= threshold {
                    self.state = State::Open {
                        opened_at: Instant::now(),
                    };
                    warn!(
                        destination = %destination,
                        failures,
                        threshold,
                        "Circuit breaker opened, rejecting sends"
                    );
                } else {
                    self.state = State::Closed { failures };
                }
            }
            State::HalfOpen => {
                self.state = State::Open {
                    opened_at: Instant::now(),
                };
                warn!(
                    destination = %destination,
                    "Circuit breaker trial send failed, reopening"
                );
            }
            State::Open { .. } => {}
        }
    }

    fn time_until_probe(&self, reset_timeout: Duration) -> Duration {
        match &self.state {
            State::Closed { .. } => Duration::ZERO,
            State::Open { opened_at } => {
                (*opened_at + reset_timeout).saturating_duration_since(Instant::now())
            }
            // The outstanding probe resolves on its own send; poll shortly.
            State::HalfOpen => reset_timeout,
        }
    }

    const fn observable_state(&self) -> BreakerState {
        match self.state {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen => BreakerState::HalfOpen,
        }
    }
}

/// Per-destination circuit breaker manager
///
/// Transitions for a given key are atomic: every operation takes the key's
/// mutex for the duration of a single state change and never across a send.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    breakers: DashMap<Destination, Arc<parking_lot::Mutex<BreakerData>>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker manager
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    fn get_breaker(&self, destination: &Destination) -> Arc<parking_lot::Mutex<BreakerData>> {
        self.breakers
            .entry(destination.clone())
            .or_insert_with(|| Arc::new(parking_lot::Mutex::new(BreakerData::new())))
            .clone()
    }

    /// Check whether a send to this destination may proceed
    ///
    /// In the open state this grants (and consumes) the recovery probe once
    /// the reset timeout has elapsed.
    pub fn allow(&self, destination: &Destination) -> bool {
        let breaker = self.get_breaker(destination);
        let mut guard = breaker.lock();
        guard.allow(
            destination,
            Duration::from_millis(self.config.reset_timeout_ms),
        )
    }

    /// Record a successful send
    pub fn record_success(&self, destination: &Destination) {
        let breaker = self.get_breaker(destination);
        let mut guard = breaker.lock();
        guard.record_success(destination);
    }

    /// Record a failed send
    pub fn record_failure(&self, destination: &Destination) {
        let breaker = self.get_breaker(destination);
        let mut guard = breaker.lock();
        guard.record_failure(destination, self.config.failure_threshold);
    }

    /// How long the caller should wait before `allow` could grant a probe
    #[must_use]
    pub fn time_until_probe(&self, destination: &Destination) -> Duration {
        let breaker = self.get_breaker(destination);
        let guard = breaker.lock();
        guard.time_until_probe(Duration::from_millis(self.config.reset_timeout_ms))
    }

    /// Current state for a destination
    #[must_use]
    pub fn state(&self, destination: &Destination) -> BreakerState {
        let breaker = self.get_breaker(destination);
        let guard = breaker.lock();
        guard.observable_state()
    }
}
