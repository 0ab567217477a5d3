//! Read-only presentation model built from timeline state.
//!
//! # Responsibility
//! - Turn blocks into display rows, newest first.
//! - Insert shift dividers and compute the running-block timer.
//!
//! # Invariants
//! - Building a view never mutates state.
//! - A divider only follows a finished block.

use crate::clock::{ends_on_later_date, format_day_label, format_elapsed, format_span, format_time};
use crate::config::CoreConfig;
use crate::model::block::{ActivityKind, Block, BlockId};
use crate::store::TimelineState;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Timing rules used for dividers and the rest indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRules {
    pub shift_gap_threshold: Duration,
    pub min_rest: Duration,
}

impl Default for ViewRules {
    fn default() -> Self {
        Self::from(&CoreConfig::default())
    }
}

impl From<&CoreConfig> for ViewRules {
    fn from(config: &CoreConfig) -> Self {
        Self {
            shift_gap_threshold: config.shift_gap_threshold(),
            min_rest: config.min_rest(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub id: BlockId,
    pub kind: ActivityKind,
    pub label: String,
    pub start_label: String,
    /// `HH:MM`, `HH:MM (+1)` or `running`.
    pub end_label: String,
    pub running: bool,
    /// Empty for the running block.
    pub duration_label: String,
    pub negative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewItem {
    Block(BlockRow),
    /// Separates two shifts; labelled with the later block's local day.
    ShiftDivider { date_label: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveBlockView {
    pub id: BlockId,
    pub kind: ActivityKind,
    pub label: String,
    pub started_label: String,
    /// `HH:MM:SS` since start.
    pub elapsed_label: String,
    /// Open transit has lasted at least the minimum rest.
    pub rest_satisfied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimelineView {
    /// Newest first.
    pub items: Vec<ViewItem>,
    pub active: Option<ActiveBlockView>,
}

impl TimelineView {
    pub fn rows(&self) -> impl Iterator<Item = &BlockRow> {
        self.items.iter().filter_map(|item| match item {
            ViewItem::Block(row) => Some(row),
            ViewItem::ShiftDivider { .. } => None,
        })
    }

    pub fn divider_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, ViewItem::ShiftDivider { .. }))
            .count()
    }
}

/// Builds the display model for `state` at `now`.
pub fn build_view<Tz: TimeZone>(
    state: &TimelineState,
    now: DateTime<Utc>,
    tz: &Tz,
    rules: &ViewRules,
) -> TimelineView {
    let mut items = Vec::with_capacity(state.blocks.len() * 2);
    for (index, block) in state.blocks.iter().enumerate().rev() {
        items.push(ViewItem::Block(block_row(block, tz)));
        if let Some(prev) = index.checked_sub(1).map(|i| &state.blocks[i]) {
            if starts_new_shift(prev, block, rules) {
                items.push(ViewItem::ShiftDivider {
                    date_label: format_day_label(block.start, tz),
                });
            }
        }
    }

    let active = state.open_block().map(|block| {
        let elapsed = now - block.start;
        ActiveBlockView {
            id: block.id,
            kind: block.kind.clone(),
            label: block.kind.display_label().to_string(),
            started_label: format_time(block.start, tz),
            elapsed_label: format_elapsed(elapsed),
            rest_satisfied: block.kind == ActivityKind::Transit && elapsed >= rules.min_rest,
        }
    });

    TimelineView { items, active }
}

/// A divider goes between `prev` and `next` when the gap between them, or a
/// long rest in `prev`, exceeds the shift gap threshold.
fn starts_new_shift(prev: &Block, next: &Block, rules: &ViewRules) -> bool {
    let Some(prev_end) = prev.end else {
        return false;
    };
    let gap = next.start - prev_end;
    let long_rest = prev.kind.is_rest() && prev_end - prev.start > rules.shift_gap_threshold;
    gap > rules.shift_gap_threshold || long_rest
}

fn block_row<Tz: TimeZone>(block: &Block, tz: &Tz) -> BlockRow {
    let (end_label, duration_label, negative) = match block.end {
        Some(end) => {
            let time = format_time(end, tz);
            let end_label = if ends_on_later_date(block.start, end, tz) {
                format!("{time} (+1)")
            } else {
                time
            };
            let span = end - block.start;
            (end_label, format_span(span), span < Duration::zero())
        }
        None => ("running".to_string(), String::new(), false),
    };

    BlockRow {
        id: block.id,
        kind: block.kind.clone(),
        label: block.kind.display_label().to_string(),
        start_label: format_time(block.start, tz),
        end_label,
        running: block.is_open(),
        duration_label,
        negative,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_view, ViewItem, ViewRules};
    use crate::model::block::{ActivityKind, Block};
    use crate::store::TimelineState;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, minute, 0).unwrap()
    }

    fn state(blocks: Vec<Block>) -> TimelineState {
        TimelineState::from_parts(blocks, Vec::new())
    }

    #[test]
    fn rows_are_newest_first_with_running_marker() {
        let state = state(vec![
            Block::closed(1, ActivityKind::Work, at(14, 8, 0), at(14, 10, 0)),
            Block::open(2, ActivityKind::Break, at(14, 10, 0)),
        ]);
        let view = build_view(&state, at(14, 10, 30), &Utc, &ViewRules::default());

        let rows: Vec<_> = view.rows().collect();
        assert_eq!(rows[0].id, 2);
        assert_eq!(rows[0].end_label, "running");
        assert!(rows[0].running);
        assert_eq!(rows[1].start_label, "08:00");
        assert_eq!(rows[1].end_label, "10:00");
        assert_eq!(rows[1].duration_label, "2h 0m");

        let active = view.active.unwrap();
        assert_eq!(active.id, 2);
        assert_eq!(active.elapsed_label, "00:30:00");
        assert_eq!(active.label, "Break");
        assert!(!active.rest_satisfied);
    }

    #[test]
    fn negative_span_is_flagged() {
        let state = state(vec![Block::closed(
            1,
            ActivityKind::Work,
            at(14, 10, 0),
            at(14, 9, 15),
        )]);
        let view = build_view(&state, at(14, 12, 0), &Utc, &ViewRules::default());
        let row = view.rows().next().unwrap();
        assert!(row.negative);
        assert_eq!(row.duration_label, "-0h 45m");
    }

    #[test]
    fn end_on_next_day_is_marked() {
        let state = state(vec![Block::closed(
            1,
            ActivityKind::Work,
            at(14, 22, 0),
            at(15, 2, 0),
        )]);
        let view = build_view(&state, at(15, 3, 0), &Utc, &ViewRules::default());
        assert_eq!(view.rows().next().unwrap().end_label, "02:00 (+1)");
    }

    #[test]
    fn long_gap_inserts_divider_between_shifts() {
        let state = state(vec![
            Block::closed(1, ActivityKind::Work, at(14, 6, 0), at(14, 14, 0)),
            Block::closed(2, ActivityKind::Work, at(15, 6, 0), at(15, 14, 0)),
        ]);
        let view = build_view(&state, at(15, 15, 0), &Utc, &ViewRules::default());

        assert_eq!(view.items.len(), 3);
        assert!(matches!(&view.items[0], ViewItem::Block(row) if row.id == 2));
        assert!(matches!(
            &view.items[1],
            ViewItem::ShiftDivider { date_label } if date_label == "Wed 15.05."
        ));
        assert!(matches!(&view.items[2], ViewItem::Block(row) if row.id == 1));
    }

    #[test]
    fn long_transit_block_inserts_divider_without_gap() {
        let state = state(vec![
            Block::closed(1, ActivityKind::Transit, at(14, 14, 0), at(15, 6, 0)),
            Block::open(2, ActivityKind::Work, at(15, 6, 0)),
        ]);
        let view = build_view(&state, at(15, 7, 0), &Utc, &ViewRules::default());
        assert_eq!(view.divider_count(), 1);
    }

    #[test]
    fn short_gap_and_short_rest_keep_one_shift() {
        let state = state(vec![
            Block::closed(1, ActivityKind::Work, at(14, 6, 0), at(14, 10, 0)),
            Block::closed(2, ActivityKind::Break, at(14, 10, 0), at(14, 11, 0)),
            Block::closed(3, ActivityKind::Work, at(14, 13, 0), at(14, 16, 0)),
        ]);
        let view = build_view(&state, at(14, 17, 0), &Utc, &ViewRules::default());
        assert_eq!(view.divider_count(), 0);
    }

    #[test]
    fn rest_indicator_after_minimum_rest_in_transit() {
        let state = state(vec![Block::open(1, ActivityKind::Transit, at(14, 18, 0))]);
        let rules = ViewRules::default();

        let early = build_view(&state, at(15, 3, 59), &Utc, &rules);
        assert!(!early.active.unwrap().rest_satisfied);

        let rested = build_view(&state, at(14, 18, 0) + Duration::hours(10), &Utc, &rules);
        let active = rested.active.unwrap();
        assert!(active.rest_satisfied);
        assert_eq!(active.elapsed_label, "10:00:00");
    }

    #[test]
    fn open_break_never_satisfies_rest() {
        let state = state(vec![Block::open(1, ActivityKind::Break, at(14, 6, 0))]);
        let view = build_view(&state, at(15, 6, 0), &Utc, &ViewRules::default());
        assert!(!view.active.unwrap().rest_satisfied);
    }
}
