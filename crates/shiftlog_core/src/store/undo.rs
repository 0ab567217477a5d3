//! Bounded undo history.
//!
//! # Invariants
//! - Never holds more than `capacity` snapshots; pushing past it evicts the
//!   oldest entry.
//! - Capacity lies in `1..=MAX_UNDO_DEPTH`.

use crate::store::TimelineState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of undoable steps.
pub const DEFAULT_UNDO_DEPTH: usize = 1;
/// Upper bound on undoable steps; every snapshot is a full timeline copy.
pub const MAX_UNDO_DEPTH: usize = 10;

/// Full copy of timeline state taken right before a destructive operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoSnapshot {
    pub state: TimelineState,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStack {
    capacity: usize,
    entries: VecDeque<UndoSnapshot>,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

impl UndoStack {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_UNDO_DEPTH);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuilds a stack from persisted entries, oldest first.
    pub fn with_entries(capacity: usize, entries: Vec<UndoSnapshot>) -> Self {
        let mut stack = Self::new(capacity);
        for entry in entries {
            stack.push(entry);
        }
        stack
    }

    pub fn push(&mut self, snapshot: UndoSnapshot) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn pop(&mut self) -> Option<UndoSnapshot> {
        self.entries.pop_back()
    }

    pub fn latest(&self) -> Option<&UndoSnapshot> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &UndoSnapshot> {
        self.entries.iter()
    }
}
