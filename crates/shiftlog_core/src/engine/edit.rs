//! Manual block edits with one-hop ripple.

use super::{EngineError, EngineResult, TimelineEngine};
use crate::clock::{parse_wall_clock, resolve_on_anchor_date, roll_end_past_midnight};
use crate::model::block::{ActivityKind, BlockId};
use crate::store::TimelineStore;
use chrono::{NaiveTime, TimeZone};
use log::debug;

/// Edit form values. Times are local wall-clock `HH:MM` strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub id: BlockId,
    pub kind: ActivityKind,
    pub start: String,
    /// Blank or `None` keeps an open block running.
    pub end: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied {
        id: BlockId,
        /// Predecessor whose end moved to the new start.
        rippled_prev: Option<BlockId>,
        /// Successor whose start moved to the new end.
        rippled_next: Option<BlockId>,
    },
    NotFound,
}

impl<Tz: TimeZone> TimelineEngine<Tz> {
    /// Applies an edit and ripples the new bounds to the direct neighbours.
    ///
    /// Both times resolve against the block's original local date; an end that
    /// lands before the new start is moved to the next day. The ripple never
    /// goes past the immediate predecessor and successor.
    pub fn save_edit(&self, store: &mut TimelineStore, request: &EditRequest) -> EngineResult<EditOutcome> {
        let Some(index) = store.state().index_of(request.id) else {
            debug!("event=block_edit module=engine status=not_found id={}", request.id);
            return Ok(EditOutcome::NotFound);
        };

        let start_time = parse_time(&request.start)?;
        let end_time = match request.end.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_time(raw)?),
            _ => None,
        };

        let state = store.state_mut();
        let was_open = state.is_open(request.id);
        if end_time.is_none() && !was_open {
            return Err(EngineError::EndRequired(request.id));
        }

        let anchor = state.blocks[index].start;
        let new_start = resolve_on_anchor_date(anchor, start_time, &self.tz)
            .ok_or_else(|| EngineError::InvalidTime(request.start.clone()))?;
        let new_end = match end_time {
            Some(end_time) => Some(
                roll_end_past_midnight(anchor, new_start, end_time, &self.tz)
                    .ok_or_else(|| EngineError::InvalidTime(request.end.clone().unwrap_or_default()))?,
            ),
            None => None,
        };

        let block = &mut state.blocks[index];
        block.kind = request.kind.clone();
        block.start = new_start;
        block.end = new_end;
        if was_open && new_end.is_some() {
            state.open_id = None;
        }

        let mut rippled_prev = None;
        if let Some(prev) = index.checked_sub(1).and_then(|i| state.blocks.get_mut(i)) {
            if prev.end.is_some() {
                prev.end = Some(new_start);
                rippled_prev = Some(prev.id);
            }
        }

        let mut rippled_next = None;
        if let Some(end) = new_end {
            if let Some(next) = state.blocks.get_mut(index + 1) {
                next.start = end;
                rippled_next = Some(next.id);
            }
        }

        debug!(
            "event=block_edit module=engine status=ok id={} rippled_prev={:?} rippled_next={:?}",
            request.id, rippled_prev, rippled_next
        );
        Ok(EditOutcome::Applied {
            id: request.id,
            rippled_prev,
            rippled_next,
        })
    }
}

fn parse_time(raw: &str) -> EngineResult<NaiveTime> {
    parse_wall_clock(raw).ok_or_else(|| EngineError::InvalidTime(raw.to_string()))
}
