//! Block domain model.
//!
//! # Responsibility
//! - Define the activity span shared by the timeline, tombstones and sync.
//! - Own the activity-kind label table (stable storage labels + display).
//!
//! # Invariants
//! - `id` is unique within one timeline (live blocks and tombstones).
//! - `end == None` marks the block as open; only one block may be open.
//! - `delete_status` is `None` for live blocks and set for tombstones.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifier for one block, derived from creation time in epoch millis.
pub type BlockId = i64;

/// Activity category of one block.
///
/// Unknown labels are kept verbatim in `Custom` so data written by newer or
/// older builds survives a load/save cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    /// Driving / on-duty work.
    Work,
    /// Standby while on duty.
    Waiting,
    /// Statutory break.
    Break,
    /// Rest between duties away from home.
    Transit,
    /// Riding along as a passenger (deadhead).
    GuestRide,
    /// Travel between home and the duty location.
    Commute,
    /// Any label not in the built-in set.
    Custom(String),
}

impl ActivityKind {
    /// Built-in kinds in button order.
    pub const BUILTIN: [ActivityKind; 6] = [
        ActivityKind::Work,
        ActivityKind::Waiting,
        ActivityKind::Break,
        ActivityKind::Transit,
        ActivityKind::GuestRide,
        ActivityKind::Commute,
    ];

    /// Parses a stored label. Never fails; unknown labels become `Custom`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "work" => Self::Work,
            "waiting" => Self::Waiting,
            "break" => Self::Break,
            "transit" => Self::Transit,
            "guest_ride" => Self::GuestRide,
            "commute" => Self::Commute,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Stable storage label.
    pub fn as_label(&self) -> &str {
        match self {
            Self::Work => "work",
            Self::Waiting => "waiting",
            Self::Break => "break",
            Self::Transit => "transit",
            Self::GuestRide => "guest_ride",
            Self::Commute => "commute",
            Self::Custom(label) => label.as_str(),
        }
    }

    /// Human-facing label.
    pub fn display_label(&self) -> &str {
        match self {
            Self::Work => "Work",
            Self::Waiting => "Waiting",
            Self::Break => "Break",
            Self::Transit => "Transit",
            Self::GuestRide => "Guest ride",
            Self::Commute => "Commute",
            Self::Custom(label) => label.as_str(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    /// Kinds whose long duration marks the end of a shift.
    pub fn is_rest(&self) -> bool {
        matches!(self, Self::Break | Self::Transit)
    }
}

impl From<String> for ActivityKind {
    fn from(value: String) -> Self {
        Self::from_label(value.as_str())
    }
}

impl From<ActivityKind> for String {
    fn from(value: ActivityKind) -> Self {
        value.as_label().to_string()
    }
}

impl Display for ActivityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Why a block left the live timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    /// Removed outright, leaving a gap.
    Deleted,
    /// Absorbed into a neighbouring block.
    Merged,
}

impl DeleteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Merged => "merged",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deleted" => Some(Self::Deleted),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }
}

/// Contiguous span of one activity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    /// Serialized as `type` to match the export/sync schema.
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub start: DateTime<Utc>,
    /// `None` while the block is running.
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_status: Option<DeleteStatus>,
}

impl Block {
    /// Creates a running block.
    pub fn open(id: BlockId, kind: ActivityKind, start: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            start,
            end: None,
            delete_status: None,
        }
    }

    /// Creates a finished block.
    pub fn closed(id: BlockId, kind: ActivityKind, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            end: Some(end),
            ..Self::open(id, kind, start)
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn is_tombstone(&self) -> bool {
        self.delete_status.is_some()
    }

    /// Span length, measuring a running block up to `now`.
    ///
    /// Negative when a manual stop/edit placed `end` before `start`.
    pub fn span(&self, now: DateTime<Utc>) -> Duration {
        self.end.unwrap_or(now) - self.start
    }
}
