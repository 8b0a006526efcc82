//! Connection lifecycle state machine.
//!
//! The machine does no I/O. The runtime feeds it transport events and obeys
//! the returned [`Directive`], which is how the "exactly one pending
//! reconnect" rule is kept in one place.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default delay between a disconnect and the next connect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Externally visible connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals raised by the underlying transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport finished opening
    Opened,
    /// The transport closed, with any code
    Closed { code: Option<u16>, reason: String },
    /// The connect attempt or the live transport failed
    Failed(String),
}

/// What the runtime must do with its reconnect timer after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    None,
    ScheduleReconnect(Duration),
    CancelReconnect,
}

/// Owns the [`ConnectionState`] and the pending-reconnect flag.
#[derive(Debug, Clone)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
    reconnect_pending: bool,
    reconnect_delay: Duration,
    torn_down: bool,
    attempts: u64,
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ConnectionLifecycle {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_pending: false,
            reconnect_delay,
            torn_down: false,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Number of connect attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Start a connect attempt (process start, or the reconnect timer fired).
    ///
    /// Returns false and changes nothing unless the machine is Disconnected
    /// and still alive.
    pub fn begin_connect(&mut self) -> bool {
        if self.torn_down || self.state != ConnectionState::Disconnected {
            return false;
        }
        self.reconnect_pending = false;
        self.attempts += 1;
        self.state = ConnectionState::Connecting;
        debug!(attempt = self.attempts, "connection lifecycle: connecting");
        true
    }

    /// Apply a transport event.
    pub fn on_event(&mut self, event: TransportEvent) -> Directive {
        if self.torn_down {
            return Directive::None;
        }

        match event {
            TransportEvent::Opened => {
                if self.state != ConnectionState::Connecting {
                    return Directive::None;
                }
                self.state = ConnectionState::Connected;
                debug!("connection lifecycle: connected");
                if self.reconnect_pending {
                    self.reconnect_pending = false;
                    Directive::CancelReconnect
                } else {
                    Directive::None
                }
            }
            TransportEvent::Closed { .. } | TransportEvent::Failed(_) => {
                if self.state == ConnectionState::Disconnected {
                    // error followed by close for the same disconnect
                    return Directive::None;
                }
                self.state = ConnectionState::Disconnected;
                if self.reconnect_pending {
                    return Directive::None;
                }
                self.reconnect_pending = true;
                debug!(
                    delay_ms = self.reconnect_delay.as_millis() as u64,
                    "connection lifecycle: disconnected, reconnect scheduled"
                );
                Directive::ScheduleReconnect(self.reconnect_delay)
            }
        }
    }

    /// Tear the machine down. No further transitions are accepted.
    pub fn teardown(&mut self) -> Directive {
        if self.torn_down {
            return Directive::None;
        }
        self.torn_down = true;
        self.state = ConnectionState::Disconnected;
        if self.reconnect_pending {
            self.reconnect_pending = false;
            Directive::CancelReconnect
        } else {
            Directive::None
        }
    }
}
