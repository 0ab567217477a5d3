//! Timeline engine: the only writer of `TimelineStore`.
//!
//! # Responsibility
//! - Create, close, edit, split and delete blocks while keeping the timeline
//!   contiguous.
//! - Capture undo snapshots before destructive operations and restore them.
//!
//! # Invariants
//! - At most one open block exists after every operation.
//! - A missing block id is reported as a `NotFound` outcome, never an error.
//! - Validation failures return `EngineError` and leave the store untouched.
//!
//! # See also
//! - `crate::service::timeline_service` for persistence and intent dispatch.

mod delete;
mod edit;
mod split;

pub use delete::{DeleteOutcome, DeletePlan, RepairOptions, RepairStrategy};
pub use edit::{EditOutcome, EditRequest};
pub use split::SplitOutcome;

use crate::model::block::{ActivityKind, Block, BlockId};
use crate::store::TimelineStore;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Open blocks younger than this are discarded without confirmation.
pub const DEFAULT_AUTO_RESUME_THRESHOLD_MINUTES: i64 = 5;

pub type EngineResult<T> = Result<T, EngineError>;

/// Validation failure raised by an engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Wall-clock input is not `HH:MM` or does not exist on the target date.
    InvalidTime(String),
    /// A finished block cannot be edited into an open one.
    EndRequired(BlockId),
    /// Split point is not strictly inside the block.
    SplitOutOfBounds {
        id: BlockId,
        at: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Repair strategy does not apply to this block and its neighbours.
    StrategyUnavailable {
        id: BlockId,
        strategy: RepairStrategy,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTime(value) => write!(f, "invalid time `{value}`; expected HH:MM"),
            Self::EndRequired(id) => write!(f, "block {id} is finished and needs an end time"),
            Self::SplitOutOfBounds { id, at, start, end } => write!(
                f,
                "split point {at} must lie strictly between {start} and {end} for block {id}"
            ),
            Self::StrategyUnavailable { id, strategy } => write!(
                f,
                "repair strategy `{}` is not available for block {id}",
                strategy.as_str()
            ),
        }
    }
}

impl Error for EngineError {}

/// Result of `start_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new block was opened; `stopped` is the block it implicitly closed.
    Started { id: BlockId, stopped: Option<BlockId> },
    /// The open block already has the requested kind.
    AlreadyActive(BlockId),
}

/// Result of `stop_current_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(BlockId),
    NoOpenBlock,
}

/// Result of `undo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// State replaced by the snapshot captured at this instant.
    Restored { captured_at: DateTime<Utc> },
    NothingToUndo,
}

/// Stateless rule set operating on a caller-owned `TimelineStore`.
///
/// `tz` is the zone used to interpret wall-clock edit and split input.
#[derive(Debug, Clone)]
pub struct TimelineEngine<Tz: TimeZone = Local> {
    tz: Tz,
    auto_resume_threshold: Duration,
}

impl Default for TimelineEngine<Local> {
    fn default() -> Self {
        Self::new(Local)
    }
}

impl<Tz: TimeZone> TimelineEngine<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            auto_resume_threshold: Duration::minutes(DEFAULT_AUTO_RESUME_THRESHOLD_MINUTES),
        }
    }

    pub fn with_auto_resume_threshold(mut self, threshold: Duration) -> Self {
        self.auto_resume_threshold = threshold;
        self
    }

    pub fn time_zone(&self) -> &Tz {
        &self.tz
    }

    pub fn auto_resume_threshold(&self) -> Duration {
        self.auto_resume_threshold
    }

    /// Opens a block of `kind` at `now`, closing any open block of another kind.
    ///
    /// Starting the kind that is already running is a no-op, which debounces
    /// repeated activation.
    pub fn start_block(
        &self,
        store: &mut TimelineStore,
        kind: ActivityKind,
        now: DateTime<Utc>,
    ) -> StartOutcome {
        if let Some(open) = store.state().open_block() {
            if open.kind == kind {
                return StartOutcome::AlreadyActive(open.id);
            }
        }

        let stopped = match self.stop_current_block(store, now) {
            StopOutcome::Stopped(id) => Some(id),
            StopOutcome::NoOpenBlock => None,
        };

        let state = store.state_mut();
        let id = state.next_block_id(now);
        debug!(
            "event=block_start module=engine status=ok id={} kind={} stopped={:?}",
            id, kind, stopped
        );
        state.blocks.push(Block::open(id, kind, now));
        state.open_id = Some(id);
        StartOutcome::Started { id, stopped }
    }

    /// Closes the open block at `end`.
    ///
    /// `end` is not checked against the block start; a reversed span shows up
    /// as a negative duration and can be fixed through `save_edit`.
    pub fn stop_current_block(&self, store: &mut TimelineStore, end: DateTime<Utc>) -> StopOutcome {
        let state = store.state_mut();
        let Some(open_id) = state.open_id.take() else {
            return StopOutcome::NoOpenBlock;
        };
        match state.blocks.iter_mut().find(|block| block.id == open_id) {
            Some(block) => {
                block.end = Some(end);
                debug!("event=block_stop module=engine status=ok id={open_id}");
                StopOutcome::Stopped(open_id)
            }
            None => {
                debug!("event=block_stop module=engine status=stale id={open_id}");
                StopOutcome::NoOpenBlock
            }
        }
    }

    /// Restores the newest undo snapshot, replacing blocks, tombstones and the
    /// open id wholesale.
    pub fn undo(&self, store: &mut TimelineStore) -> UndoOutcome {
        match store.restore_latest() {
            Some(captured_at) => {
                debug!("event=undo module=engine status=ok captured_at={captured_at}");
                UndoOutcome::Restored { captured_at }
            }
            None => UndoOutcome::NothingToUndo,
        }
    }
}
