//! Deletion with gap repair.
//!
//! # Invariants
//! - Every executed deletion captures an undo snapshot first.
//! - Removed blocks are moved to tombstones with `deleted` (gap left) or
//!   `merged` (absorbed by a neighbour).
//! - A strategy that does not fit the target is rejected without mutation.

use super::{EngineError, EngineResult, TimelineEngine};
use crate::model::block::{BlockId, DeleteStatus};
use crate::store::{TimelineState, TimelineStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use log::debug;
use std::str::FromStr;

/// How the hole left by a deleted block is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairStrategy {
    /// Open block only: discard it and reopen its predecessor.
    ResumePrevious,
    /// Predecessor and successor share a kind: collapse all three into the
    /// predecessor.
    Merge,
    /// Predecessor absorbs the deleted span.
    StretchPrev,
    /// Successor absorbs the deleted span.
    PullNext,
    /// Remove the block and leave a gap.
    LeaveGap,
}

impl RepairStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResumePrevious => "undo-current",
            Self::Merge => "merge",
            Self::StretchPrev => "stretch-prev",
            Self::PullNext => "pull-next",
            Self::LeaveGap => "none",
        }
    }
}

impl FromStr for RepairStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "undo-current" | "resume" => Ok(Self::ResumePrevious),
            "merge" => Ok(Self::Merge),
            "stretch-prev" => Ok(Self::StretchPrev),
            "pull-next" => Ok(Self::PullNext),
            "none" | "gap" => Ok(Self::LeaveGap),
            other => Err(format!(
                "unknown repair strategy `{other}`; expected undo-current|merge|stretch-prev|pull-next|none"
            )),
        }
    }
}

/// Repair strategies applicable to a finished block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepairOptions {
    pub merge: bool,
    pub stretch_prev: bool,
    pub pull_next: bool,
}

impl RepairOptions {
    pub fn allows(self, strategy: RepairStrategy) -> bool {
        match strategy {
            RepairStrategy::Merge => self.merge,
            RepairStrategy::StretchPrev => self.stretch_prev,
            RepairStrategy::PullNext => self.pull_next,
            RepairStrategy::LeaveGap => true,
            RepairStrategy::ResumePrevious => false,
        }
    }
}

/// What a delete request needs from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePlan {
    NotFound,
    /// Open block started moments ago: resume the predecessor without asking.
    AutoResume { id: BlockId },
    /// Open block has run past the threshold: the caller picks
    /// `ResumePrevious` or `LeaveGap`.
    ConfirmResume {
        id: BlockId,
        elapsed: Duration,
        has_previous: bool,
    },
    /// Finished block: the caller picks one of the offered repairs.
    Repair { id: BlockId, options: RepairOptions },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Applied {
        strategy: RepairStrategy,
        /// Tombstoned ids in removal order.
        removed: Vec<BlockId>,
        /// Open block after the deletion.
        open_id: Option<BlockId>,
    },
    NotFound,
}

impl<Tz: TimeZone> TimelineEngine<Tz> {
    /// Decides how a delete request for `id` proceeds at `now`.
    pub fn plan_delete(&self, store: &TimelineStore, id: BlockId, now: DateTime<Utc>) -> DeletePlan {
        let state = store.state();
        let Some(index) = state.index_of(id) else {
            return DeletePlan::NotFound;
        };

        if state.is_open(id) {
            let elapsed = now - state.blocks[index].start;
            if elapsed < self.auto_resume_threshold {
                return DeletePlan::AutoResume { id };
            }
            return DeletePlan::ConfirmResume {
                id,
                elapsed,
                has_previous: index > 0,
            };
        }

        DeletePlan::Repair {
            id,
            options: repair_options(state, index),
        }
    }

    /// Removes `id` from the timeline using `strategy`.
    pub fn delete_block(
        &self,
        store: &mut TimelineStore,
        id: BlockId,
        strategy: RepairStrategy,
        now: DateTime<Utc>,
    ) -> EngineResult<DeleteOutcome> {
        let state = store.state();
        let Some(index) = state.index_of(id) else {
            debug!("event=block_delete module=engine status=not_found id={id}");
            return Ok(DeleteOutcome::NotFound);
        };

        let allowed = if state.is_open(id) {
            matches!(strategy, RepairStrategy::ResumePrevious | RepairStrategy::LeaveGap)
        } else {
            repair_options(state, index).allows(strategy)
        };
        if !allowed {
            return Err(EngineError::StrategyUnavailable { id, strategy });
        }

        store.capture_snapshot(now);
        let state = store.state_mut();
        let removed = match strategy {
            RepairStrategy::ResumePrevious => resume_previous(state, index),
            RepairStrategy::Merge => merge_neighbours(state, index),
            RepairStrategy::StretchPrev => {
                let end = state.blocks[index].end;
                state.blocks[index - 1].end = end;
                vec![state.tombstone_at(index, DeleteStatus::Merged)]
            }
            RepairStrategy::PullNext => {
                let start = state.blocks[index].start;
                state.blocks[index + 1].start = start;
                vec![state.tombstone_at(index, DeleteStatus::Merged)]
            }
            RepairStrategy::LeaveGap => vec![state.tombstone_at(index, DeleteStatus::Deleted)],
        };

        debug!(
            "event=block_delete module=engine status=ok id={} strategy={} removed={:?}",
            id,
            strategy.as_str(),
            removed
        );
        Ok(DeleteOutcome::Applied {
            strategy,
            removed,
            open_id: state.open_id,
        })
    }
}

fn repair_options(state: &TimelineState, index: usize) -> RepairOptions {
    let prev = index.checked_sub(1).and_then(|i| state.blocks.get(i));
    let next = state.blocks.get(index + 1);
    RepairOptions {
        merge: matches!((prev, next), (Some(prev), Some(next)) if prev.kind == next.kind),
        stretch_prev: prev.is_some(),
        pull_next: next.is_some(),
    }
}

fn resume_previous(state: &mut TimelineState, index: usize) -> Vec<BlockId> {
    let removed = state.tombstone_at(index, DeleteStatus::Deleted);
    state.open_id = None;
    if let Some(prev) = index.checked_sub(1).and_then(|i| state.blocks.get_mut(i)) {
        prev.end = None;
        state.open_id = Some(prev.id);
    }
    vec![removed]
}

fn merge_neighbours(state: &mut TimelineState, index: usize) -> Vec<BlockId> {
    let next = &state.blocks[index + 1];
    let next_was_open = state.open_id == Some(next.id);
    let next_end = next.end;

    let prev = &mut state.blocks[index - 1];
    prev.end = if next_was_open { None } else { next_end };
    let prev_id = prev.id;

    let target = state.tombstone_at(index, DeleteStatus::Merged);
    let absorbed = state.tombstone_at(index, DeleteStatus::Merged);
    if next_was_open {
        state.open_id = Some(prev_id);
    }
    vec![target, absorbed]
}

#[cfg(test)]
mod tests {
    use super::{DeleteOutcome, DeletePlan, RepairOptions, RepairStrategy};
    use crate::engine::{EngineError, TimelineEngine, UndoOutcome};
    use crate::model::block::{ActivityKind, Block, DeleteStatus};
    use crate::store::{TimelineState, TimelineStore, UndoStack};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, hour, minute, 0).unwrap()
    }

    fn store(blocks: Vec<Block>) -> TimelineStore {
        TimelineStore::new(TimelineState::from_parts(blocks, Vec::new()), UndoStack::default())
    }

    fn sandwich() -> TimelineStore {
        store(vec![
            Block::closed(1, ActivityKind::Work, at(8, 0), at(10, 0)),
            Block::closed(2, ActivityKind::Break, at(10, 0), at(10, 30)),
            Block::closed(3, ActivityKind::Work, at(10, 30), at(12, 0)),
        ])
    }

    #[test]
    fn plans_repairs_for_finished_block() {
        let engine = TimelineEngine::new(Utc);
        let store = sandwich();
        assert_eq!(
            engine.plan_delete(&store, 2, at(13, 0)),
            DeletePlan::Repair {
                id: 2,
                options: RepairOptions {
                    merge: true,
                    stretch_prev: true,
                    pull_next: true
                }
            }
        );
        assert_eq!(
            engine.plan_delete(&store, 1, at(13, 0)),
            DeletePlan::Repair {
                id: 1,
                options: RepairOptions {
                    merge: false,
                    stretch_prev: false,
                    pull_next: true
                }
            }
        );
        assert_eq!(engine.plan_delete(&store, 99, at(13, 0)), DeletePlan::NotFound);
    }

    #[test]
    fn plans_auto_resume_for_fresh_open_block() {
        let engine = TimelineEngine::new(Utc);
        let store = store(vec![
            Block::closed(1, ActivityKind::Work, at(8, 0), at(10, 0)),
            Block::open(2, ActivityKind::Break, at(10, 0)),
        ]);
        assert_eq!(
            engine.plan_delete(&store, 2, at(10, 4)),
            DeletePlan::AutoResume { id: 2 }
        );
        assert_eq!(
            engine.plan_delete(&store, 2, at(10, 5)),
            DeletePlan::ConfirmResume {
                id: 2,
                elapsed: Duration::minutes(5),
                has_previous: true
            }
        );
    }

    #[test]
    fn stretch_prev_extends_predecessor() {
        let engine = TimelineEngine::new(Utc);
        let mut store = sandwich();
        engine
            .delete_block(&mut store, 2, RepairStrategy::StretchPrev, at(13, 0))
            .unwrap();

        let state = store.state();
        assert_eq!(state.blocks.len(), 2);
        assert_eq!(state.blocks[0].end, Some(at(10, 30)));
        assert!(state.get(2).is_none());
        assert_eq!(state.tombstones[0].id, 2);
        assert_eq!(state.tombstones[0].delete_status, Some(DeleteStatus::Merged));
    }

    #[test]
    fn pull_next_extends_successor() {
        let engine = TimelineEngine::new(Utc);
        let mut store = sandwich();
        engine
            .delete_block(&mut store, 2, RepairStrategy::PullNext, at(13, 0))
            .unwrap();
        assert_eq!(store.state().blocks[1].start, at(10, 0));
        assert_eq!(store.state().tombstones[0].delete_status, Some(DeleteStatus::Merged));
    }

    #[test]
    fn merge_collapses_three_blocks() {
        let engine = TimelineEngine::new(Utc);
        let mut store = sandwich();
        let outcome = engine
            .delete_block(&mut store, 2, RepairStrategy::Merge, at(13, 0))
            .unwrap();

        assert_eq!(
            outcome,
            DeleteOutcome::Applied {
                strategy: RepairStrategy::Merge,
                removed: vec![2, 3],
                open_id: None
            }
        );
        let state = store.state();
        assert_eq!(state.blocks.len(), 1);
        assert_eq!(state.blocks[0].end, Some(at(12, 0)));
        assert!(state
            .tombstones
            .iter()
            .all(|block| block.delete_status == Some(DeleteStatus::Merged)));
    }

    #[test]
    fn merge_into_open_successor_reopens_predecessor() {
        let engine = TimelineEngine::new(Utc);
        let mut store = store(vec![
            Block::closed(1, ActivityKind::Work, at(8, 0), at(10, 0)),
            Block::closed(2, ActivityKind::Break, at(10, 0), at(10, 30)),
            Block::open(3, ActivityKind::Work, at(10, 30)),
        ]);
        engine
            .delete_block(&mut store, 2, RepairStrategy::Merge, at(13, 0))
            .unwrap();

        let state = store.state();
        assert_eq!(state.open_id, Some(1));
        assert!(state.blocks[0].is_open());
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn merge_requires_matching_neighbours() {
        let engine = TimelineEngine::new(Utc);
        let mut store = store(vec![
            Block::closed(1, ActivityKind::Work, at(8, 0), at(10, 0)),
            Block::closed(2, ActivityKind::Break, at(10, 0), at(10, 30)),
            Block::closed(3, ActivityKind::Waiting, at(10, 30), at(12, 0)),
        ]);
        let before = store.state().clone();
        let err = engine
            .delete_block(&mut store, 2, RepairStrategy::Merge, at(13, 0))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::StrategyUnavailable {
                id: 2,
                strategy: RepairStrategy::Merge
            }
        );
        assert_eq!(store.state(), &before);
        assert!(store.undo_stack().is_empty());
    }

    #[test]
    fn leave_gap_marks_deleted() {
        let engine = TimelineEngine::new(Utc);
        let mut store = sandwich();
        engine
            .delete_block(&mut store, 2, RepairStrategy::LeaveGap, at(13, 0))
            .unwrap();
        let state = store.state();
        assert_eq!(state.blocks[0].end, Some(at(10, 0)));
        assert_eq!(state.blocks[1].start, at(10, 30));
        assert_eq!(state.tombstones[0].delete_status, Some(DeleteStatus::Deleted));
    }

    #[test]
    fn resume_previous_reopens_predecessor() {
        let engine = TimelineEngine::new(Utc);
        let mut store = store(vec![
            Block::closed(1, ActivityKind::Work, at(8, 0), at(10, 0)),
            Block::open(2, ActivityKind::Break, at(10, 0)),
        ]);
        engine
            .delete_block(&mut store, 2, RepairStrategy::ResumePrevious, at(10, 2))
            .unwrap();
        let state = store.state();
        assert_eq!(state.open_id, Some(1));
        assert!(state.blocks[0].is_open());
        assert_eq!(state.tombstones[0].delete_status, Some(DeleteStatus::Deleted));
    }

    #[test]
    fn resume_previous_without_predecessor_leaves_nothing_open() {
        let engine = TimelineEngine::new(Utc);
        let mut store = store(vec![Block::open(1, ActivityKind::Work, at(8, 0))]);
        engine
            .delete_block(&mut store, 1, RepairStrategy::ResumePrevious, at(8, 1))
            .unwrap();
        assert!(store.state().blocks.is_empty());
        assert_eq!(store.state().open_id, None);
    }

    #[test]
    fn open_block_rejects_repair_strategies() {
        let engine = TimelineEngine::new(Utc);
        let mut store = store(vec![
            Block::closed(1, ActivityKind::Work, at(8, 0), at(10, 0)),
            Block::open(2, ActivityKind::Break, at(10, 0)),
        ]);
        let err = engine
            .delete_block(&mut store, 2, RepairStrategy::StretchPrev, at(11, 0))
            .unwrap_err();
        assert!(matches!(err, EngineError::StrategyUnavailable { .. }));
    }

    #[test]
    fn undo_restores_exact_state_once() {
        let engine = TimelineEngine::new(Utc);
        let mut store = sandwich();
        let before = store.state().clone();
        engine
            .delete_block(&mut store, 2, RepairStrategy::Merge, at(13, 0))
            .unwrap();

        assert_eq!(
            engine.undo(&mut store),
            UndoOutcome::Restored {
                captured_at: at(13, 0)
            }
        );
        assert_eq!(store.state(), &before);
        assert_eq!(engine.undo(&mut store), UndoOutcome::NothingToUndo);
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn strategy_labels_parse() {
        for strategy in [
            RepairStrategy::ResumePrevious,
            RepairStrategy::Merge,
            RepairStrategy::StretchPrev,
            RepairStrategy::PullNext,
            RepairStrategy::LeaveGap,
        ] {
            assert_eq!(strategy.as_str().parse::<RepairStrategy>(), Ok(strategy));
        }
        assert!("sideways".parse::<RepairStrategy>().is_err());
    }
}
