use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use shiftlog_core::db::open_db_in_memory;
use shiftlog_core::store::UndoSnapshot;
use shiftlog_core::{
    ActivityKind, Block, DeleteStatus, LoadStatus, RepoError, SqliteTimelineRepository,
    TimelineRepository, TimelineState,
};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 14, hour, minute, 0).unwrap()
}

fn sample_state() -> TimelineState {
    let mut merged = Block::closed(2, ActivityKind::Waiting, at(9, 0), at(9, 30));
    merged.delete_status = Some(DeleteStatus::Merged);
    TimelineState::from_parts(
        vec![
            Block::closed(1, ActivityKind::Work, at(8, 0), at(10, 0)),
            Block::closed(3, ActivityKind::from_label("Depot"), at(10, 0), at(10, 20)),
            Block::open(4, ActivityKind::GuestRide, at(10, 20)),
        ],
        vec![merged],
    )
}

#[test]
fn empty_database_loads_fresh() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTimelineRepository::try_new(&conn).unwrap();

    let loaded = repo.load().unwrap();
    assert_eq!(loaded.status, LoadStatus::Fresh);
    assert!(loaded.state.is_empty());
    assert_eq!(loaded.state.open_id, None);
}

#[test]
fn save_and_load_roundtrip_preserves_order_open_block_and_tombstones() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTimelineRepository::try_new(&conn).unwrap();
    let state = sample_state();

    repo.save(&state).unwrap();
    let loaded = repo.load().unwrap();

    assert_eq!(loaded.status, LoadStatus::Loaded);
    assert_eq!(loaded.state, state);
    assert_eq!(loaded.state.open_id, Some(4));
    assert_eq!(loaded.state.blocks[1].kind.as_label(), "Depot");
}

#[test]
fn save_replaces_previous_content() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTimelineRepository::try_new(&conn).unwrap();

    repo.save(&sample_state()).unwrap();
    let smaller = TimelineState::from_parts(
        vec![Block::closed(9, ActivityKind::Commute, at(6, 0), at(7, 0))],
        Vec::new(),
    );
    repo.save(&smaller).unwrap();

    assert_eq!(repo.load().unwrap().state, smaller);
}

#[test]
fn two_open_rows_recover_to_empty_state() {
    let conn = open_db_in_memory().unwrap();
    insert_block(&conn, 0, 1, "work", at(8, 0).timestamp_millis(), None);
    insert_block(&conn, 1, 2, "break", at(9, 0).timestamp_millis(), None);
    let repo = SqliteTimelineRepository::try_new(&conn).unwrap();

    let loaded = repo.load().unwrap();
    assert_eq!(loaded.status, LoadStatus::Recovered);
    assert!(loaded.state.is_empty());
}

#[test]
fn unreadable_values_recover_to_empty_state() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO blocks (position, id, kind, start_ms, end_ms) VALUES (0, 1, 'work', 'yesterday', NULL);",
        [],
    )
    .unwrap();
    let repo = SqliteTimelineRepository::try_new(&conn).unwrap();

    let loaded = repo.load().unwrap();
    assert_eq!(loaded.status, LoadStatus::Recovered);
    assert!(loaded.state.blocks.is_empty());
}

#[test]
fn out_of_range_timestamp_recovers_to_empty_state() {
    let conn = open_db_in_memory().unwrap();
    insert_block(&conn, 0, 1, "work", i64::MAX, None);
    let repo = SqliteTimelineRepository::try_new(&conn).unwrap();
    assert_eq!(repo.load().unwrap().status, LoadStatus::Recovered);
}

#[test]
fn undo_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shiftlog.sqlite3");
    let snapshot = UndoSnapshot {
        state: sample_state(),
        captured_at: at(11, 0),
    };

    {
        let conn = shiftlog_core::db::open_db(&path).unwrap();
        let repo = SqliteTimelineRepository::try_new(&conn).unwrap();
        repo.save_undo(std::slice::from_ref(&snapshot)).unwrap();
    }

    let conn = shiftlog_core::db::open_db(&path).unwrap();
    let repo = SqliteTimelineRepository::try_new(&conn).unwrap();
    assert_eq!(repo.load_undo().unwrap(), vec![snapshot]);

    repo.save_undo(&[]).unwrap();
    assert!(repo.load_undo().unwrap().is_empty());
}

#[test]
fn corrupt_undo_payload_is_skipped() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO undo_slots (position, captured_at_ms, payload) VALUES (0, 0, '{broken');",
        [],
    )
    .unwrap();
    let repo = SqliteTimelineRepository::try_new(&conn).unwrap();
    assert!(repo.load_undo().unwrap().is_empty());
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let result = SqliteTimelineRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::SchemaNotReady { found: 0, .. })
    ));
}

fn insert_block(conn: &Connection, position: i64, id: i64, kind: &str, start_ms: i64, end_ms: Option<i64>) {
    conn.execute(
        "INSERT INTO blocks (position, id, kind, start_ms, end_ms) VALUES (?1, ?2, ?3, ?4, ?5);",
        rusqlite::params![position, id, kind, start_ms, end_ms],
    )
    .unwrap();
}
