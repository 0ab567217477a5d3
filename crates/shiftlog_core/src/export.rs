//! Comma-delimited export of live blocks.

use crate::clock::{format_date, format_time, whole_minutes};
use crate::model::block::Block;
use chrono::TimeZone;

pub const EXPORT_HEADER: &str = "id,type,start_date,start_time,end_time,duration_min";
/// End-time cell for the running block.
pub const IN_PROGRESS: &str = "in progress";

/// Renders one row per block in timeline order, preceded by the header.
///
/// Duration is floored to whole minutes and `0` for the running block.
pub fn export_csv<'a, Tz: TimeZone>(blocks: impl IntoIterator<Item = &'a Block>, tz: &Tz) -> String {
    let mut out = String::from(EXPORT_HEADER);
    out.push('\n');
    for block in blocks {
        let (end_time, duration) = match block.end {
            Some(end) => (format_time(end, tz), whole_minutes(block.start, end)),
            None => (IN_PROGRESS.to_string(), 0),
        };
        let cells = [
            block.id.to_string(),
            quote(block.kind.as_label()),
            format_date(block.start, tz),
            format_time(block.start, tz),
            end_time,
            duration.to_string(),
        ];
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn quote(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
