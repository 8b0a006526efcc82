//! Minimum-interval gate applied at the point of transmission.

use std::time::{Duration, Instant};

/// Default minimum spacing between two transmitted frames.
pub const DEFAULT_MIN_SEND_INTERVAL: Duration = Duration::from_millis(500);

/// Admits at most one send per `min_interval`, across all message kinds.
///
/// Only successful sends are recorded, so a rejected or failed attempt does
/// not push the next slot back.
#[derive(Debug, Clone)]
pub struct SendGate {
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl SendGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    /// True if a frame may be sent at `now`.
    pub fn is_open(&self, now: Instant) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        }
    }

    /// Record a successful send at `now`.
    pub fn record(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

impl Default for SendGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SEND_INTERVAL)
    }
}
