//! Timeline use-case service.
//!
//! # Responsibility
//! - Own the session: store, engine, repository and clock.
//! - Run every user intent as engine operation followed by a save.
//! - Track the undo affordance window.
//!
//! # Invariants
//! - State and undo history are persisted after every applied mutation.
//! - `NotFound` and no-op outcomes never write to storage.
//! - The service is storage-agnostic; it only talks to repository traits.

use crate::clock::{format_time, parse_wall_clock, roll_end_past_midnight, Clock, SystemClock};
use crate::config::CoreConfig;
use crate::engine::{
    DeleteOutcome, DeletePlan, EditOutcome, EditRequest, EngineError, RepairStrategy,
    SplitOutcome, StartOutcome, StopOutcome, TimelineEngine, UndoOutcome,
};
use crate::export::export_csv;
use crate::model::block::{ActivityKind, BlockId};
use crate::repo::settings_repo::{SettingsRepository, SYNC_CREDENTIAL_KEY};
use crate::repo::timeline_repo::{LoadStatus, RepoError, TimelineRepository};
use crate::store::{TimelineState, TimelineStore, UndoSnapshot, UndoStack};
use crate::sync::{SyncClient, SyncError, SyncReport};
use crate::view::{build_view, TimelineView, ViewRules};
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    Engine(EngineError),
    Repo(RepoError),
    Sync(SyncError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engine(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Sync(err) => Some(err),
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SyncError> for ServiceError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

/// Prefilled values for the edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub id: BlockId,
    pub kind: ActivityKind,
    pub start: String,
    /// `None` while the block is running.
    pub end: Option<String>,
    pub running: bool,
}

/// Proposed split point for the split dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitProposal {
    pub id: BlockId,
    pub at: DateTime<Utc>,
    pub at_label: String,
}

/// Result of a delete request before any strategy was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRequestOutcome {
    /// Deletion already happened (young open block) or the id was unknown.
    Done(DeleteOutcome),
    /// The caller must pick a strategy offered by the plan.
    Choose(DeletePlan),
}

/// Session context for one timeline.
pub struct TimelineService<R, C = SystemClock, Tz = Local>
where
    R: TimelineRepository + SettingsRepository,
    C: Clock,
    Tz: TimeZone,
{
    repo: R,
    clock: C,
    engine: TimelineEngine<Tz>,
    store: TimelineStore,
    undo_window: Duration,
    view_rules: ViewRules,
    load_status: LoadStatus,
    sync_client: Option<SyncClient>,
}

/// Migrates retired labels inside persisted snapshots and drops snapshots
/// that break a timeline invariant. The flag reports whether anything changed.
fn sanitize_undo(entries: Vec<UndoSnapshot>) -> (Vec<UndoSnapshot>, bool) {
    let mut changed = false;
    let mut kept = Vec::with_capacity(entries.len());
    for mut entry in entries {
        changed |= entry.state.migrate_legacy_kinds() > 0;
        match entry.state.check_invariants() {
            Ok(()) => kept.push(entry),
            Err(err) => {
                warn!("event=undo_restore module=service status=dropped reason={err}");
                changed = true;
            }
        }
    }
    (kept, changed)
}

impl<R, C, Tz> TimelineService<R, C, Tz>
where
    R: TimelineRepository + SettingsRepository,
    C: Clock,
    Tz: TimeZone,
{
    /// Loads persisted state, migrates retired kind labels and restores the
    /// undo history under the same rules.
    ///
    /// State and undo slots are written back only when something changed.
    pub fn open(repo: R, clock: C, tz: Tz, config: &CoreConfig) -> ServiceResult<Self> {
        let loaded = repo.load()?;
        let mut state = loaded.state;
        let migrated = state.migrate_legacy_kinds();
        if migrated > 0 {
            repo.save(&state)?;
            info!("event=legacy_migrate module=service status=ok rewritten={migrated}");
        }
        if loaded.status == LoadStatus::Recovered {
            warn!("event=timeline_open module=service status=recovered");
        }

        let (entries, undo_changed) = sanitize_undo(repo.load_undo()?);
        if undo_changed {
            repo.save_undo(&entries)?;
        }
        let undo = UndoStack::with_entries(config.undo_depth, entries);
        let engine = TimelineEngine::new(tz).with_auto_resume_threshold(config.auto_resume_threshold());
        info!(
            "event=timeline_open module=service status=ok blocks={} tombstones={} undo={}",
            state.blocks.len(),
            state.tombstones.len(),
            undo.len()
        );

        Ok(Self {
            repo,
            clock,
            engine,
            store: TimelineStore::new(state, undo),
            undo_window: config.undo_window(),
            view_rules: ViewRules::from(config),
            load_status: loaded.status,
            sync_client: None,
        })
    }

    pub fn with_sync_client(mut self, client: SyncClient) -> Self {
        self.sync_client = Some(client);
        self
    }

    pub fn state(&self) -> &TimelineState {
        self.store.state()
    }

    pub fn load_status(&self) -> LoadStatus {
        self.load_status
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn start(&mut self, kind: ActivityKind) -> ServiceResult<StartOutcome> {
        let outcome = self.engine.start_block(&mut self.store, kind, self.clock.now());
        if let StartOutcome::Started { id, .. } = outcome {
            self.persist_state()?;
            info!("event=block_start module=service status=ok id={id}");
        }
        Ok(outcome)
    }

    pub fn stop(&mut self) -> ServiceResult<StopOutcome> {
        let outcome = self.engine.stop_current_block(&mut self.store, self.clock.now());
        if let StopOutcome::Stopped(id) = outcome {
            self.persist_state()?;
            info!("event=block_stop module=service status=ok id={id}");
        }
        Ok(outcome)
    }

    /// Current values of `id` formatted for the edit form.
    pub fn edit_request(&self, id: BlockId) -> Option<EditForm> {
        let block = self.store.state().get(id)?;
        let tz = self.engine.time_zone();
        Some(EditForm {
            id,
            kind: block.kind.clone(),
            start: format_time(block.start, tz),
            end: block.end.map(|end| format_time(end, tz)),
            running: block.is_open(),
        })
    }

    pub fn save_edit(&mut self, request: &EditRequest) -> ServiceResult<EditOutcome> {
        let outcome = self.engine.save_edit(&mut self.store, request)?;
        if let EditOutcome::Applied { id, .. } = outcome {
            self.persist_state()?;
            info!("event=block_edit module=service status=ok id={id}");
        }
        Ok(outcome)
    }

    /// Starts deletion of `id`.
    ///
    /// A young open block is resumed away immediately; anything else returns
    /// the plan so the caller can pick a strategy.
    pub fn request_delete(&mut self, id: BlockId) -> ServiceResult<DeleteRequestOutcome> {
        match self.engine.plan_delete(&self.store, id, self.clock.now()) {
            DeletePlan::NotFound => Ok(DeleteRequestOutcome::Done(DeleteOutcome::NotFound)),
            DeletePlan::AutoResume { id } => {
                let outcome = self.choose_delete_strategy(id, RepairStrategy::ResumePrevious)?;
                Ok(DeleteRequestOutcome::Done(outcome))
            }
            plan => Ok(DeleteRequestOutcome::Choose(plan)),
        }
    }

    pub fn choose_delete_strategy(
        &mut self,
        id: BlockId,
        strategy: RepairStrategy,
    ) -> ServiceResult<DeleteOutcome> {
        let outcome = self
            .engine
            .delete_block(&mut self.store, id, strategy, self.clock.now())?;
        if let DeleteOutcome::Applied { ref removed, .. } = outcome {
            self.persist_with_undo()?;
            info!(
                "event=block_delete module=service status=ok id={} strategy={} removed={}",
                id,
                strategy.as_str(),
                removed.len()
            );
        }
        Ok(outcome)
    }

    pub fn split_request(&self, id: BlockId) -> Option<SplitProposal> {
        let at = self
            .engine
            .proposed_split_point(&self.store, id, self.clock.now())?;
        Some(SplitProposal {
            id,
            at,
            at_label: format_time(at, self.engine.time_zone()),
        })
    }

    /// Splits at a wall-clock `HH:MM`, read on the block's start date and
    /// rolled past midnight when it lands before the start.
    pub fn split_confirm(&mut self, id: BlockId, time: &str) -> ServiceResult<SplitOutcome> {
        let Some(start) = self.store.state().get(id).map(|block| block.start) else {
            return Ok(SplitOutcome::NotFound);
        };
        let at = parse_wall_clock(time)
            .and_then(|wall| roll_end_past_midnight(start, start, wall, self.engine.time_zone()))
            .ok_or_else(|| EngineError::InvalidTime(time.to_string()))?;
        self.split_at(id, at)
    }

    pub fn split_at(&mut self, id: BlockId, at: DateTime<Utc>) -> ServiceResult<SplitOutcome> {
        let outcome = self
            .engine
            .split_block(&mut self.store, id, at, self.clock.now())?;
        if let SplitOutcome::Applied { created, .. } = outcome {
            self.persist_with_undo()?;
            info!("event=block_split module=service status=ok id={id} created={created}");
        }
        Ok(outcome)
    }

    pub fn undo(&mut self) -> ServiceResult<UndoOutcome> {
        let outcome = self.engine.undo(&mut self.store);
        if let UndoOutcome::Restored { .. } = outcome {
            self.persist_with_undo()?;
            info!("event=undo module=service status=ok");
        }
        Ok(outcome)
    }

    /// True while the newest snapshot is younger than the undo window.
    pub fn undo_available(&self) -> bool {
        self.store
            .undo_stack()
            .latest()
            .is_some_and(|snapshot| self.clock.now() - snapshot.captured_at < self.undo_window)
    }

    /// Drops all blocks, tombstones and undo history. Sync settings stay.
    pub fn reset(&mut self) -> ServiceResult<()> {
        self.store.clear();
        self.persist_with_undo()?;
        info!("event=timeline_reset module=service status=ok");
        Ok(())
    }

    pub fn export(&self) -> String {
        export_csv(&self.store.state().blocks, self.engine.time_zone())
    }

    pub fn view(&self) -> TimelineView {
        build_view(
            self.store.state(),
            self.clock.now(),
            self.engine.time_zone(),
            &self.view_rules,
        )
    }

    /// Uploads the timeline. Without an explicit credential the one that
    /// last resolved the endpoint is used.
    pub fn sync(&self, credential: Option<&str>) -> ServiceResult<SyncReport> {
        let client = self.sync_client.as_ref().ok_or(SyncError::NotConfigured)?;
        let credential = match credential {
            Some(value) => value.to_string(),
            None => self
                .repo
                .get_setting(SYNC_CREDENTIAL_KEY)?
                .ok_or(SyncError::MissingCredential)?,
        };
        let report = client.upload(
            &self.repo,
            &credential,
            self.store.state(),
            self.engine.time_zone(),
        )?;
        Ok(report)
    }

    fn persist_state(&self) -> ServiceResult<()> {
        self.repo.save(self.store.state())?;
        Ok(())
    }

    fn persist_with_undo(&self) -> ServiceResult<()> {
        self.repo.save(self.store.state())?;
        let entries: Vec<UndoSnapshot> = self.store.undo_stack().entries().cloned().collect();
        self.repo.save_undo(&entries)?;
        Ok(())
    }
}
