//! Presentation intents and their dispatch onto `TimelineService`.

use super::timeline_service::{
    DeleteRequestOutcome, EditForm, ServiceResult, SplitProposal, TimelineService,
};
use crate::clock::Clock;
use crate::engine::{
    DeleteOutcome, EditOutcome, EditRequest, RepairStrategy, SplitOutcome, StartOutcome,
    StopOutcome, UndoOutcome,
};
use crate::model::block::{ActivityKind, BlockId};
use crate::repo::settings_repo::SettingsRepository;
use crate::repo::timeline_repo::TimelineRepository;
use crate::sync::SyncReport;
use chrono::{DateTime, TimeZone, Utc};
use log::debug;

/// One user gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start(ActivityKind),
    Stop,
    EditRequest(BlockId),
    SaveEdit(EditRequest),
    DeleteRequest(BlockId),
    DeleteStrategy { id: BlockId, strategy: RepairStrategy },
    SplitRequest(BlockId),
    /// Split at a wall-clock `HH:MM` typed by the user.
    SplitConfirm { id: BlockId, time: String },
    /// Split at an exact instant, e.g. an accepted `SplitProposal::at`.
    SplitAt { id: BlockId, at: DateTime<Utc> },
    Undo,
    Reset,
    Export,
    Sync { credential: Option<String> },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Stop => "stop",
            Self::EditRequest(_) => "edit_request",
            Self::SaveEdit(_) => "save_edit",
            Self::DeleteRequest(_) => "delete_request",
            Self::DeleteStrategy { .. } => "delete_strategy",
            Self::SplitRequest(_) => "split_request",
            Self::SplitConfirm { .. } => "split_confirm",
            Self::SplitAt { .. } => "split_at",
            Self::Undo => "undo",
            Self::Reset => "reset",
            Self::Export => "export",
            Self::Sync { .. } => "sync",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentResponse {
    Started(StartOutcome),
    Stopped(StopOutcome),
    EditForm(Option<EditForm>),
    Edited(EditOutcome),
    DeleteRequested(DeleteRequestOutcome),
    Deleted(DeleteOutcome),
    SplitProposed(Option<SplitProposal>),
    Split(SplitOutcome),
    Undone(UndoOutcome),
    Reset,
    Exported(String),
    Synced(SyncReport),
}

impl<R, C, Tz> TimelineService<R, C, Tz>
where
    R: TimelineRepository + SettingsRepository,
    C: Clock,
    Tz: TimeZone,
{
    /// Routes an intent to the matching service operation.
    pub fn dispatch(&mut self, intent: Intent) -> ServiceResult<IntentResponse> {
        debug!("event=intent module=service status=start intent={}", intent.name());
        let response = match intent {
            Intent::Start(kind) => IntentResponse::Started(self.start(kind)?),
            Intent::Stop => IntentResponse::Stopped(self.stop()?),
            Intent::EditRequest(id) => IntentResponse::EditForm(self.edit_request(id)),
            Intent::SaveEdit(request) => IntentResponse::Edited(self.save_edit(&request)?),
            Intent::DeleteRequest(id) => IntentResponse::DeleteRequested(self.request_delete(id)?),
            Intent::DeleteStrategy { id, strategy } => {
                IntentResponse::Deleted(self.choose_delete_strategy(id, strategy)?)
            }
            Intent::SplitRequest(id) => IntentResponse::SplitProposed(self.split_request(id)),
            Intent::SplitConfirm { id, time } => IntentResponse::Split(self.split_confirm(id, &time)?),
            Intent::SplitAt { id, at } => IntentResponse::Split(self.split_at(id, at)?),
            Intent::Undo => IntentResponse::Undone(self.undo()?),
            Intent::Reset => {
                self.reset()?;
                IntentResponse::Reset
            }
            Intent::Export => IntentResponse::Exported(self.export()),
            Intent::Sync { credential } => {
                IntentResponse::Synced(self.sync(credential.as_deref())?)
            }
        };
        Ok(response)
    }
}
