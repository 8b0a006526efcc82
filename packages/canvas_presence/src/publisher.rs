//! Outbound publisher: turns local pointer state and box clicks into
//! rate-limited wire frames.

use presence_core::{LocalPointer, OutboundMessage, SendGate, WireFormat};
use std::time::Instant;
use tracing::{debug, error};

use crate::config::ChannelConfig;

/// Counters for publish attempts (for logging and tests).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    pub sent: u64,
    /// Transport was not sendable
    pub dropped_unsendable: u64,
    /// Minimum interval had not elapsed
    pub dropped_throttled: u64,
}

pub struct Publisher {
    pointer: LocalPointer,
    gate: SendGate,
    additional_data: String,
    wire_format: WireFormat,
    stats: PublishStats,
}

impl Publisher {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            pointer: LocalPointer::default(),
            gate: SendGate::new(config.min_send_interval),
            additional_data: config.additional_data.clone(),
            wire_format: config.wire_format,
            stats: PublishStats::default(),
        }
    }

    pub fn move_pointer(&mut self, pointer: LocalPointer) {
        self.pointer = pointer;
    }

    pub fn pointer(&self) -> LocalPointer {
        self.pointer
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Report of the last known pointer position.
    pub fn pointer_message(&self) -> OutboundMessage {
        OutboundMessage::MouseMove {
            x: self.pointer.x,
            y: self.pointer.y,
            index: None,
            additional_data: self.additional_data.clone(),
        }
    }

    pub fn box_click_message(&self, index: u32) -> OutboundMessage {
        OutboundMessage::BoxClick {
            index,
            additional_data: self.additional_data.clone(),
        }
    }

    /// Encode `message` if it may go out now.
    ///
    /// Dropped attempts are not queued; the next tick carries fresher state.
    pub fn prepare(
        &mut self,
        message: &OutboundMessage,
        sendable: bool,
        now: Instant,
    ) -> Option<String> {
        if !sendable {
            self.stats.dropped_unsendable += 1;
            debug!(kind = message.kind(), "dropping packet: connection not sendable");
            return None;
        }
        if !self.gate.is_open(now) {
            self.stats.dropped_throttled += 1;
            debug!(kind = message.kind(), "dropping packet: send interval not elapsed");
            return None;
        }
        match message.encode(self.wire_format) {
            Ok(Some(text)) => Some(text),
            Ok(None) => {
                debug!(
                    kind = message.kind(),
                    "packet kind not carried by {:?} wire format", self.wire_format
                );
                None
            }
            Err(e) => {
                error!(kind = message.kind(), error = %e, "failed to encode packet");
                None
            }
        }
    }

    /// Record a frame that the transport accepted at `now`.
    pub fn sent(&mut self, now: Instant) {
        self.gate.record(now);
        self.stats.sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn publisher() -> Publisher {
        Publisher::new(&ChannelConfig::default())
    }

    #[test]
    fn unsendable_never_encodes() {
        let mut p = publisher();
        let msg = p.pointer_message();
        assert!(p.prepare(&msg, false, Instant::now()).is_none());
        assert_eq!(p.stats().dropped_unsendable, 1);
    }

    #[test]
    fn second_attempt_within_interval_is_dropped() {
        let t0 = Instant::now();
        let mut p = publisher();

        let pointer = p.pointer_message();
        assert!(p.prepare(&pointer, true, t0).is_some());
        p.sent(t0);

        let click = p.box_click_message(3);
        assert!(p.prepare(&click, true, t0 + Duration::from_millis(200)).is_none());
        assert!(p.prepare(&click, true, t0 + Duration::from_millis(500)).is_some());
        assert_eq!(p.stats().dropped_throttled, 1);
        assert_eq!(p.stats().sent, 1);
    }

    #[test]
    fn failed_send_does_not_close_gate() {
        let t0 = Instant::now();
        let mut p = publisher();
        let msg = p.pointer_message();
        assert!(p.prepare(&msg, true, t0).is_some());
        // transport rejected it; sent() never called
        assert!(p.prepare(&msg, true, t0 + Duration::from_millis(1)).is_some());
    }

    #[test]
    fn carries_latest_pointer() {
        let mut p = publisher();
        p.move_pointer(LocalPointer::new(3, 4));
        p.move_pointer(LocalPointer::new(30, 40));
        let text = p.prepare(&p.pointer_message(), true, Instant::now()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "mousemove");
        assert_eq!((value["x"].as_i64(), value["y"].as_i64()), (Some(30), Some(40)));
        assert_eq!(value["additionalData"], "exampleData");
    }

    #[test]
    fn legacy_format_skips_box_clicks() {
        let config = ChannelConfig {
            wire_format: WireFormat::Legacy,
            ..ChannelConfig::default()
        };
        let mut p = Publisher::new(&config);
        let click = p.box_click_message(1);
        assert!(p.prepare(&click, true, Instant::now()).is_none());
        let text = p.prepare(&p.pointer_message(), true, Instant::now()).unwrap();
        assert_eq!(text, r#"{"x":0,"y":0}"#);
    }
}
