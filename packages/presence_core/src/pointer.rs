//! Local pointer and box-selection state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Last sampled local pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalPointer {
    pub x: i32,
    pub y: i32,
}

impl LocalPointer {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Box indices toggled by local clicks. Never part of presence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    selected: BTreeSet<u32>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip `index`. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, index: u32) -> bool {
        if self.selected.remove(&index) {
            false
        } else {
            self.selected.insert(index);
            true
        }
    }

    pub fn contains(&self, index: u32) -> bool {
        self.selected.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.selected.iter().copied()
    }
}
