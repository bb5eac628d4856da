//! Transport connection lifecycle.
//!
//! `Disconnected → Connecting → Connected → Disconnected`, plus
//! `Connecting → Disconnected` for a failed attempt. Retries are driven by
//! [`ReconnectPolicy`]; nothing here touches the digit engine.

use std::time::Duration;

use corelib::ConnectionState;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid connection transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: ConnectionState,
    /// Successful connections so far.
    connects: u64,
    /// Failed attempts since the last successful connection.
    failures: u32,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connects(&self) -> u64 {
        self.connects
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn transition(&mut self, to: ConnectionState) -> Result<ConnectionState, InvalidTransition> {
        use ConnectionState::*;

        let from = self.state;
        match (from, to) {
            (Disconnected, Connecting) => {}
            (Connecting, Connected) => {
                self.connects += 1;
                self.failures = 0;
            }
            (Connecting, Disconnected) => self.failures += 1,
            (Connected, Disconnected) => {}
            _ => return Err(InvalidTransition { from, to }),
        }

        self.state = to;
        Ok(from)
    }
}

/// Fixed delay plus random jitter between reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            max_jitter: Duration::from_millis(300),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Self::default()
        }
    }

    pub fn next_delay(&self) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.base_delay + Duration::from_millis(extra)
    }
}
