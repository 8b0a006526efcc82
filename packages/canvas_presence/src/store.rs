//! Inbound presence store.
//!
//! Applies relayed frames to the presence table and publishes a fresh
//! snapshot to readers after every change.

use presence_core::{InboundError, PresenceSnapshot, PresenceTable, decode_relayed};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::config::ChannelConfig;

pub struct PresenceStore {
    table: PresenceTable,
    accept_anonymous: bool,
    stale_after: Option<Duration>,
    snapshot_tx: watch::Sender<Arc<PresenceSnapshot>>,
}

impl PresenceStore {
    pub fn new(config: &ChannelConfig, snapshot_tx: watch::Sender<Arc<PresenceSnapshot>>) -> Self {
        Self {
            table: PresenceTable::with_anonymous_limit(config.anonymous_limit),
            accept_anonymous: config.accept_anonymous,
            stale_after: config.stale_after,
            snapshot_tx,
        }
    }

    pub fn table(&self) -> &PresenceTable {
        &self.table
    }

    /// Apply one text frame. Malformed frames are logged and dropped.
    ///
    /// Returns true if the table changed.
    pub fn apply_frame(&mut self, text: &str, now: Instant) -> bool {
        match decode_relayed(text, self.accept_anonymous) {
            Ok(update) => {
                let changed = self.table.apply(update, now);
                if changed {
                    self.publish();
                }
                changed
            }
            Err(InboundError::Parse(e)) => {
                error!(error = %e, "error parsing presence message");
                false
            }
            Err(e) => {
                warn!(error = %e, frame = %text, "received message with unexpected format");
                false
            }
        }
    }

    /// Drop sources that went quiet, if a staleness window is configured.
    pub fn evict_stale(&mut self, now: Instant) -> usize {
        let Some(max_age) = self.stale_after else {
            return 0;
        };
        let evicted = self.table.evict_stale(now, max_age);
        if evicted > 0 {
            debug!(evicted, "evicted stale presence entries");
            self.publish();
        }
        evicted
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Arc::new(self.table.snapshot()));
    }
}
