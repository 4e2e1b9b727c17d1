//! Bounded exponential reconnection backoff.

use std::time::Duration;

/// Delay generator for stream reconnection.
///
/// `increment` doubles the current delay and clamps it at the ceiling, so a
/// long failure streak can never overflow or grow unbounded. `reset` returns
/// to the floor once a connection succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    current_ms: u64,
    start_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(start_ms: u64, max_ms: u64) -> Self {
        Self {
            current_ms: start_ms,
            start_ms,
            max_ms,
        }
    }

    /// Current delay in milliseconds.
    pub fn value(&self) -> u64 {
        self.current_ms
    }

    /// Current delay as a [`Duration`].
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Return to the starting delay.
    pub fn reset(&mut self) {
        self.current_ms = self.start_ms;
    }

    /// Double the delay, clamped to the ceiling.
    pub fn increment(&mut self) {
        self.current_ms = self.current_ms.saturating_mul(2).min(self.max_ms);
    }
}
