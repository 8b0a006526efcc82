//! Per-source presence table.
//!
//! Sourced updates replace the previous entry for that source wholesale.
//! Anonymous updates (legacy relays) are kept in a bounded ring, oldest first.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::protocol::PresenceUpdate;

/// Default cap on retained anonymous positions.
pub const DEFAULT_ANONYMOUS_LIMIT: usize = 256;

/// A bare position with no source attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Last-known position of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub x: i32,
    pub y: i32,
    pub source: String,
}

struct Slot {
    entry: PresenceEntry,
    updated_at: Instant,
}

/// Mapping from source to last-known position.
pub struct PresenceTable {
    entries: HashMap<String, Slot>,
    anonymous: VecDeque<Position>,
    anonymous_limit: usize,
}

/// Read-only view handed to rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// Sourced entries, sorted by source
    pub entries: Vec<PresenceEntry>,
    /// Anonymous positions, oldest first
    pub anonymous: Vec<Position>,
}

impl PresenceSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len() + self.anonymous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.anonymous.is_empty()
    }

    pub fn get(&self, source: &str) -> Option<&PresenceEntry> {
        self.entries.iter().find(|e| e.source == source)
    }
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::with_anonymous_limit(DEFAULT_ANONYMOUS_LIMIT)
    }

    pub fn with_anonymous_limit(anonymous_limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            anonymous: VecDeque::new(),
            anonymous_limit,
        }
    }

    /// Apply one decoded update. Returns true if the table changed.
    pub fn apply(&mut self, update: PresenceUpdate, now: Instant) -> bool {
        match update {
            PresenceUpdate::Sourced(entry) => {
                let changed = self
                    .entries
                    .get(&entry.source)
                    .is_none_or(|slot| slot.entry != entry);
                self.entries.insert(
                    entry.source.clone(),
                    Slot {
                        entry,
                        updated_at: now,
                    },
                );
                changed
            }
            PresenceUpdate::Anonymous(position) => {
                if self.anonymous_limit == 0 {
                    return false;
                }
                while self.anonymous.len() >= self.anonymous_limit {
                    self.anonymous.pop_front();
                }
                self.anonymous.push_back(position);
                true
            }
        }
    }

    pub fn get(&self, source: &str) -> Option<&PresenceEntry> {
        self.entries.get(source).map(|slot| &slot.entry)
    }

    /// Remove one source. Returns the entry it held.
    pub fn remove(&mut self, source: &str) -> Option<PresenceEntry> {
        self.entries.remove(source).map(|slot| slot.entry)
    }

    /// Drop sourced entries not refreshed within `max_age`.
    pub fn evict_stale(&mut self, now: Instant, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, slot| now.saturating_duration_since(slot.updated_at) < max_age);
        before - self.entries.len()
    }

    /// Number of sourced entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn anonymous_len(&self) -> usize {
        self.anonymous.len()
    }

    pub fn snapshot(&self) -> PresenceSnapshot {
        let mut entries: Vec<PresenceEntry> =
            self.entries.values().map(|slot| slot.entry.clone()).collect();
        entries.sort_by(|a, b| a.source.cmp(&b.source));
        PresenceSnapshot {
            entries,
            anonymous: self.anonymous.iter().copied().collect(),
        }
    }
}

impl Default for PresenceTable {
    fn default() -> Self {
        Self::new()
    }
}
