//! Splitting one block into two adjacent blocks of the same kind.

use super::{EngineError, EngineResult, TimelineEngine};
use crate::clock::midpoint;
use crate::model::block::{Block, BlockId};
use crate::store::TimelineStore;
use chrono::{DateTime, TimeZone, Utc};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOutcome {
    Applied { original: BlockId, created: BlockId },
    NotFound,
}

impl<Tz: TimeZone> TimelineEngine<Tz> {
    /// Suggested split point: halfway between start and end, using `now` as
    /// the end of a running block.
    pub fn proposed_split_point(
        &self,
        store: &TimelineStore,
        id: BlockId,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let block = store.state().get(id)?;
        Some(midpoint(block.start, block.end.unwrap_or(now)))
    }

    /// Splits `id` at `at`, inserting the right-hand half directly after it.
    ///
    /// `at` must lie strictly inside the block. When the block is running the
    /// new right-hand block becomes the open block.
    pub fn split_block(
        &self,
        store: &mut TimelineStore,
        id: BlockId,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<SplitOutcome> {
        let state = store.state();
        let Some(index) = state.index_of(id) else {
            debug!("event=block_split module=engine status=not_found id={id}");
            return Ok(SplitOutcome::NotFound);
        };

        let block = &state.blocks[index];
        let upper = block.end.unwrap_or(now);
        if !(block.start < at && at < upper) {
            return Err(EngineError::SplitOutOfBounds {
                id,
                at,
                start: block.start,
                end: upper,
            });
        }

        store.capture_snapshot(now);
        let state = store.state_mut();
        let created = state.next_block_id(now);
        let original = &mut state.blocks[index];
        let right = Block {
            id: created,
            kind: original.kind.clone(),
            start: at,
            end: original.end,
            delete_status: None,
        };
        original.end = Some(at);
        state.blocks.insert(index + 1, right);
        if state.open_id == Some(id) {
            state.open_id = Some(created);
        }

        debug!("event=block_split module=engine status=ok id={id} created={created}");
        Ok(SplitOutcome::Applied {
            original: id,
            created,
        })
    }
}
