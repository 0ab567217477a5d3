//! Clock source and local-time conversions.
//!
//! # Responsibility
//! - Supply "now" through the `Clock` trait so engine callers stay testable.
//! - Convert between UTC instants and local wall-clock strings (`HH:MM`).
//! - Format durations for timer and list display.
//!
//! # Invariants
//! - All stored instants are UTC; local time only exists at the edges.
//! - Wall-clock input is resolved against a local calendar date, never
//!   guessed from the current day.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::Cell;

static WALL_CLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid wall clock regex"));

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic callers and tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Parses `H:MM` / `HH:MM` wall-clock input.
///
/// Returns `None` for anything outside `00:00..=23:59`.
pub fn parse_wall_clock(value: &str) -> Option<NaiveTime> {
    let caps = WALL_CLOCK_RE.captures(value.trim())?;
    let hours = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let minutes = caps.get(2)?.as_str().parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Returns the local calendar date of `instant` in `tz`.
pub fn local_date<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Resolves a wall-clock time on a given local date into a UTC instant.
///
/// Ambiguous local times (DST fold) resolve to the earlier instant; times that
/// do not exist on that date (DST gap) yield `None`.
pub fn resolve_local<Tz: TimeZone>(date: NaiveDate, time: NaiveTime, tz: &Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(value) => Some(value.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Resolves `time` on the local date that `anchor` falls on.
pub fn resolve_on_anchor_date<Tz: TimeZone>(
    anchor: DateTime<Utc>,
    time: NaiveTime,
    tz: &Tz,
) -> Option<DateTime<Utc>> {
    resolve_local(local_date(anchor, tz), time, tz)
}

/// Resolves an end time against `anchor`'s date, rolling forward one local day
/// when the result would land before `start` (shift crossing midnight).
///
/// This is the only date inference applied to edited blocks; a block is
/// assumed to never span more than one midnight.
pub fn roll_end_past_midnight<Tz: TimeZone>(
    anchor: DateTime<Utc>,
    start: DateTime<Utc>,
    end_time: NaiveTime,
    tz: &Tz,
) -> Option<DateTime<Utc>> {
    let date = local_date(anchor, tz);
    let same_day = resolve_local(date, end_time, tz)?;
    if same_day >= start {
        return Some(same_day);
    }
    resolve_local(date.succ_opt()?, end_time, tz)
}

/// Formats an instant as local `HH:MM`.
pub fn format_time<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String {
    instant
        .with_timezone(tz)
        .naive_local()
        .format("%H:%M")
        .to_string()
}

/// Formats an instant as local `YYYY-MM-DD`.
pub fn format_date<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String {
    instant
        .with_timezone(tz)
        .naive_local()
        .format("%Y-%m-%d")
        .to_string()
}

/// Formats an instant as a short weekday label, e.g. `Tue 14.05.`.
pub fn format_day_label<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String {
    instant
        .with_timezone(tz)
        .naive_local()
        .format("%a %d.%m.")
        .to_string()
}

/// Whether `end` falls on a later local calendar date than `start`.
pub fn ends_on_later_date<Tz: TimeZone>(start: DateTime<Utc>, end: DateTime<Utc>, tz: &Tz) -> bool {
    local_date(end, tz) > local_date(start, tz)
}

/// Whole minutes between two instants, floored toward negative infinity.
pub fn whole_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().div_euclid(60_000)
}

/// Midpoint between two instants.
pub fn midpoint(start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    start + (end - start) / 2
}

/// Formats a running timer as `HH:MM:SS`; negative spans clamp to zero.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Formats a block duration as `Hh Mm`, prefixed with `-` when negative.
pub fn format_span(span: Duration) -> String {
    let sign = if span < Duration::zero() { "-" } else { "" };
    let minutes = span.num_minutes().abs();
    format!("{sign}{}h {}m", minutes / 60, minutes % 60)
}
