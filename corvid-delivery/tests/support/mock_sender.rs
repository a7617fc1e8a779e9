//! Scripted sender for exercising the delivery loop
//!
//! Outcomes are consumed front to back; once the script is exhausted every
//! further attempt reports `Delivered`. Every attempt is recorded with its
//! (virtual) timestamp so tests can assert on scheduling, not just counts.

#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use async_trait::async_trait;
use corvid_delivery::{Destination, SendOutcome, Sender};
use tokio::time::Instant;

/// One recorded call to [`Sender::send`]
#[derive(Debug, Clone)]
pub struct SendCall {
    pub destination: Destination,
    pub payload: Vec<u8>,
    pub at: Instant,
}

/// Sender that replays a scripted list of outcomes
pub struct MockSender {
    script: Mutex<VecDeque<SendOutcome>>,
    calls: Mutex<Vec<SendCall>>,
    delay: Option<Duration>,
}

impl MockSender {
    pub fn new(script: impl IntoIterator<Item = SendOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// A sender whose every attempt succeeds
    pub fn always_delivers() -> Self {
        Self::new([])
    }

    /// Make every send take this long before responding
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<SendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Sender for MockSender {
    async fn send(&self, destination: &Destination, payload: &[u8]) -> SendOutcome {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(SendCall {
            destination: destination.clone(),
            payload: payload.to_vec(),
            at: Instant::now(),
        });

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SendOutcome::Delivered)
    }
}
