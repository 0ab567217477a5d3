//! Core domain logic for shiftlog.
//! This crate is the single source of truth for timeline invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod export;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod sync;
pub mod view;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, CoreConfig};
pub use engine::{
    DeleteOutcome, DeletePlan, EditOutcome, EditRequest, EngineError, RepairOptions,
    RepairStrategy, SplitOutcome, StartOutcome, StopOutcome, TimelineEngine, UndoOutcome,
};
pub use logging::{init_logging, LoggingError};
pub use model::block::{ActivityKind, Block, BlockId, DeleteStatus};
pub use repo::settings_repo::SettingsRepository;
pub use repo::timeline_repo::{
    LoadStatus, LoadedTimeline, RepoError, RepoResult, SqliteTimelineRepository,
    TimelineRepository,
};
pub use service::intent::{Intent, IntentResponse};
pub use service::timeline_service::{
    DeleteRequestOutcome, EditForm, ServiceError, ServiceResult, SplitProposal, TimelineService,
};
pub use store::{TimelineState, TimelineStore};
pub use sync::{HttpTransport, SyncClient, SyncError, SyncReport, SyncTransport};
pub use view::{ActiveBlockView, BlockRow, TimelineView, ViewItem, ViewRules};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
