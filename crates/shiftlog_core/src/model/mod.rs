//! Domain model for the activity timeline.
//!
//! # Responsibility
//! - Define the block record used by the store, engine, persistence and sync.
//! - Keep the retired-label table next to the kinds it migrates into.
//!
//! # Invariants
//! - Every block is identified by a stable `BlockId`.
//! - Deletion moves blocks to tombstones; nothing is hard-deleted.

pub mod block;
pub mod legacy;
