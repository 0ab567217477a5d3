//! Retired activity labels and their current replacements.
//!
//! # Invariants
//! - Rewriting is one-way and idempotent: a migrated label is always a
//!   built-in label, which never maps again.

use crate::model::block::{ActivityKind, Block};

/// Returns the current kind for a retired label, if any.
pub fn replacement_for(label: &str) -> Option<ActivityKind> {
    match label {
        "Transfer" | "Gastfahrt" => Some(ActivityKind::GuestRide),
        "Arbeit" => Some(ActivityKind::Work),
        "Wartezeit" => Some(ActivityKind::Waiting),
        "Pause" => Some(ActivityKind::Break),
        "Übergang" => Some(ActivityKind::Transit),
        "An-/Abreise" => Some(ActivityKind::Commute),
        _ => None,
    }
}

/// Rewrites retired labels in place and returns how many blocks changed.
pub fn migrate_blocks<'a>(blocks: impl IntoIterator<Item = &'a mut Block>) -> usize {
    let mut rewritten = 0;
    for block in blocks {
        let ActivityKind::Custom(label) = &block.kind else {
            continue;
        };
        if let Some(current) = replacement_for(label) {
            block.kind = current;
            rewritten += 1;
        }
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::{migrate_blocks, replacement_for};
    use crate::model::block::{ActivityKind, Block};
    use chrono::{TimeZone, Utc};

    fn block(id: i64, label: &str) -> Block {
        let start = Utc.with_ymd_and_hms(2024, 5, 14, 8, 0, 0).unwrap();
        Block::open(id, ActivityKind::from_label(label), start)
    }

    #[test]
    fn maps_transfer_to_guest_ride() {
        assert_eq!(replacement_for("Transfer"), Some(ActivityKind::GuestRide));
        assert_eq!(replacement_for("work"), None);
    }

    #[test]
    fn migration_is_idempotent() {
        let mut blocks = vec![block(1, "Transfer"), block(2, "work"), block(3, "Arbeit")];
        assert_eq!(migrate_blocks(blocks.iter_mut()), 2);
        assert_eq!(blocks[0].kind, ActivityKind::GuestRide);
        assert_eq!(blocks[2].kind, ActivityKind::Work);
        assert_eq!(migrate_blocks(blocks.iter_mut()), 0);
    }

    #[test]
    fn unknown_custom_labels_are_left_alone() {
        let mut blocks = vec![block(1, "Training")];
        assert_eq!(migrate_blocks(blocks.iter_mut()), 0);
        assert_eq!(blocks[0].kind, ActivityKind::Custom("Training".to_string()));
    }
}
