//! In-memory timeline store.
//!
//! # Responsibility
//! - Own the ordered live blocks, the tombstone list and the open-block id.
//! - Hold the bounded undo history for destructive engine operations.
//! - Check structural invariants for loaded or mutated state.
//!
//! # Invariants
//! - Live blocks stay in insertion order, which is chronological by
//!   construction.
//! - At most one live block has `end == None`, and `open_id` points at it.
//! - Block ids are unique across live blocks and tombstones.
//!
//! # See also
//! - `crate::engine` for the only writer of this state.

pub mod undo;

use crate::model::block::{Block, BlockId, DeleteStatus};
use crate::model::legacy::migrate_blocks;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
pub use undo::{UndoSnapshot, UndoStack, DEFAULT_UNDO_DEPTH};

/// Structural invariant violated by a timeline state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    MultipleOpenBlocks { first: BlockId, second: BlockId },
    OpenIdMismatch { open_id: Option<BlockId>, running: Option<BlockId> },
    DuplicateId(BlockId),
    LiveBlockTombstoned(BlockId),
    TombstoneWithoutStatus(BlockId),
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultipleOpenBlocks { first, second } => {
                write!(f, "blocks {first} and {second} are both open")
            }
            Self::OpenIdMismatch { open_id, running } => write!(
                f,
                "open id {open_id:?} does not match running block {running:?}"
            ),
            Self::DuplicateId(id) => write!(f, "block id {id} is used more than once"),
            Self::LiveBlockTombstoned(id) => {
                write!(f, "live block {id} carries a delete status")
            }
            Self::TombstoneWithoutStatus(id) => {
                write!(f, "tombstone {id} has no delete status")
            }
        }
    }
}

impl Error for InvariantViolation {}

/// Snapshot-able timeline data: live blocks, tombstones, open block id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineState {
    pub blocks: Vec<Block>,
    pub tombstones: Vec<Block>,
    pub open_id: Option<BlockId>,
}

impl TimelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds state from persisted collections, deriving the open id from the
    /// block that has no end.
    pub fn from_parts(blocks: Vec<Block>, tombstones: Vec<Block>) -> Self {
        let open_id = blocks.iter().rev().find(|block| block.is_open()).map(|block| block.id);
        Self {
            blocks,
            tombstones,
            open_id,
        }
    }

    /// True when there is nothing live and nothing tombstoned.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.tombstones.is_empty()
    }

    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| block.id == id)
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }

    pub fn open_block(&self) -> Option<&Block> {
        self.open_id.and_then(|id| self.get(id))
    }

    pub fn is_open(&self, id: BlockId) -> bool {
        self.open_id == Some(id)
    }

    /// Allocates an id derived from `now`, bumped past every id in use.
    pub fn next_block_id(&self, now: DateTime<Utc>) -> BlockId {
        let highest = self
            .blocks
            .iter()
            .chain(self.tombstones.iter())
            .map(|block| block.id)
            .max();
        let candidate = now.timestamp_millis();
        match highest {
            Some(highest) if highest >= candidate => highest + 1,
            _ => candidate,
        }
    }

    /// Moves the live block at `index` to the tombstone list.
    ///
    /// Returns the removed block id.
    pub(crate) fn tombstone_at(&mut self, index: usize, status: DeleteStatus) -> BlockId {
        let mut block = self.blocks.remove(index);
        block.delete_status = Some(status);
        let id = block.id;
        if self.open_id == Some(id) {
            self.open_id = None;
        }
        self.tombstones.push(block);
        id
    }

    /// Rewrites retired kind labels on live blocks and tombstones.
    pub fn migrate_legacy_kinds(&mut self) -> usize {
        migrate_blocks(self.blocks.iter_mut().chain(self.tombstones.iter_mut()))
    }

    /// Verifies structural invariants.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen = HashSet::new();
        for block in self.blocks.iter().chain(self.tombstones.iter()) {
            if !seen.insert(block.id) {
                return Err(InvariantViolation::DuplicateId(block.id));
            }
        }

        let mut running: Option<BlockId> = None;
        for block in &self.blocks {
            if block.is_tombstone() {
                return Err(InvariantViolation::LiveBlockTombstoned(block.id));
            }
            if block.is_open() {
                if let Some(first) = running {
                    return Err(InvariantViolation::MultipleOpenBlocks {
                        first,
                        second: block.id,
                    });
                }
                running = Some(block.id);
            }
        }
        if running != self.open_id {
            return Err(InvariantViolation::OpenIdMismatch {
                open_id: self.open_id,
                running,
            });
        }

        if let Some(block) = self.tombstones.iter().find(|block| !block.is_tombstone()) {
            return Err(InvariantViolation::TombstoneWithoutStatus(block.id));
        }
        Ok(())
    }
}

/// Timeline state plus its undo history.
#[derive(Debug, Clone, Default)]
pub struct TimelineStore {
    state: TimelineState,
    undo: UndoStack,
}

impl TimelineStore {
    pub fn new(state: TimelineState, undo: UndoStack) -> Self {
        Self { state, undo }
    }

    pub fn state(&self) -> &TimelineState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut TimelineState {
        &mut self.state
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    /// Pushes a deep copy of the current state onto the undo history.
    pub(crate) fn capture_snapshot(&mut self, now: DateTime<Utc>) {
        let snapshot = UndoSnapshot {
            state: self.state.clone(),
            captured_at: now,
        };
        self.undo.push(snapshot);
    }

    /// Pops the newest snapshot and swaps it in wholesale.
    pub(crate) fn restore_latest(&mut self) -> Option<DateTime<Utc>> {
        let snapshot = self.undo.pop()?;
        self.state = snapshot.state;
        Some(snapshot.captured_at)
    }

    /// Drops all timeline data and undo history.
    pub fn clear(&mut self) {
        self.state = TimelineState::default();
        self.undo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{InvariantViolation, TimelineState};
    use crate::model::block::{ActivityKind, Block, DeleteStatus};
    use chrono::{TimeZone, Utc};

    fn t(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, hour, 0, 0).unwrap()
    }

    #[test]
    fn from_parts_derives_open_id() {
        let state = TimelineState::from_parts(
            vec![
                Block::closed(1, ActivityKind::Work, t(8), t(10)),
                Block::open(2, ActivityKind::Break, t(10)),
            ],
            Vec::new(),
        );
        assert_eq!(state.open_id, Some(2));
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn next_id_never_collides() {
        let state = TimelineState::from_parts(
            vec![Block::closed(t(9).timestamp_millis(), ActivityKind::Work, t(8), t(9))],
            Vec::new(),
        );
        assert_eq!(state.next_block_id(t(8)), t(9).timestamp_millis() + 1);
        assert_eq!(state.next_block_id(t(10)), t(10).timestamp_millis());
    }

    #[test]
    fn detects_two_open_blocks() {
        let state = TimelineState {
            blocks: vec![
                Block::open(1, ActivityKind::Work, t(8)),
                Block::open(2, ActivityKind::Break, t(9)),
            ],
            tombstones: Vec::new(),
            open_id: Some(2),
        };
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::MultipleOpenBlocks { first: 1, second: 2 })
        );
    }

    #[test]
    fn detects_duplicate_ids_across_tombstones() {
        let mut gone = Block::closed(1, ActivityKind::Work, t(8), t(9));
        gone.delete_status = Some(DeleteStatus::Deleted);
        let state = TimelineState::from_parts(
            vec![Block::closed(1, ActivityKind::Work, t(9), t(10))],
            vec![gone],
        );
        assert_eq!(state.check_invariants(), Err(InvariantViolation::DuplicateId(1)));
    }

    #[test]
    fn tombstone_at_clears_open_marker() {
        let mut state = TimelineState::from_parts(
            vec![Block::open(1, ActivityKind::Work, t(8))],
            Vec::new(),
        );
        state.tombstone_at(0, DeleteStatus::Deleted);
        assert!(state.blocks.is_empty());
        assert_eq!(state.open_id, None);
        assert_eq!(state.tombstones[0].delete_status, Some(DeleteStatus::Deleted));
        assert!(state.check_invariants().is_ok());
    }
}
