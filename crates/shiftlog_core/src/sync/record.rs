//! Wire records for the upload endpoint.

use crate::clock::{format_date, format_time, whole_minutes};
use crate::export::IN_PROGRESS;
use crate::model::block::{Block, BlockId};
use chrono::TimeZone;
use serde::{Deserialize, Serialize};

/// One block flattened to local date and wall-clock strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_date: String,
    pub start_time: String,
    pub end_time: String,
    /// Whole minutes, `0` while running.
    pub duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_status: Option<String>,
}

pub fn flatten_block<Tz: TimeZone>(block: &Block, tz: &Tz) -> SyncRecord {
    let (end_time, duration) = match block.end {
        Some(end) => (format_time(end, tz), whole_minutes(block.start, end)),
        None => (IN_PROGRESS.to_string(), 0),
    };
    SyncRecord {
        id: block.id,
        kind: block.kind.as_label().to_string(),
        start_date: format_date(block.start, tz),
        start_time: format_time(block.start, tz),
        end_time,
        duration,
        delete_status: block.delete_status.map(|status| status.as_str().to_string()),
    }
}

#[derive(Debug, Serialize)]
pub struct UploadPayload<'a> {
    pub password: &'a str,
    pub data: Vec<SyncRecord>,
    pub deleted: Vec<SyncRecord>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GatekeeperRequest<'a> {
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GatekeeperResponse {
    pub result: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub result: String,
    #[serde(default)]
    pub processed: Option<u64>,
    #[serde(default)]
    pub new_versions_created: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
