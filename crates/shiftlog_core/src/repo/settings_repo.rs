//! Key/value settings stored next to the timeline.
//!
//! Settings survive `reset`; only timeline tables are cleared there.

use super::timeline_repo::{RepoResult, SqliteTimelineRepository};
use rusqlite::{params, OptionalExtension};

/// Shared secret that resolved the cached endpoint.
pub const SYNC_CREDENTIAL_KEY: &str = "sync.credential";
/// Upload endpoint resolved by the gatekeeper.
pub const SYNC_ENDPOINT_KEY: &str = "sync.endpoint";

pub trait SettingsRepository {
    fn get_setting(&self, key: &str) -> RepoResult<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> RepoResult<()>;
    fn remove_setting(&self, key: &str) -> RepoResult<()>;
}

impl SettingsRepository for SqliteTimelineRepository<'_> {
    fn get_setting(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1;",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_setting(&self, key: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1;", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SettingsRepository, SYNC_CREDENTIAL_KEY};
    use crate::db::open_db_in_memory;
    use crate::repo::timeline_repo::SqliteTimelineRepository;

    #[test]
    fn set_overwrites_and_remove_clears() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTimelineRepository::try_new(&conn).unwrap();

        assert_eq!(repo.get_setting(SYNC_CREDENTIAL_KEY).unwrap(), None);
        repo.set_setting(SYNC_CREDENTIAL_KEY, "first").unwrap();
        repo.set_setting(SYNC_CREDENTIAL_KEY, "second").unwrap();
        assert_eq!(
            repo.get_setting(SYNC_CREDENTIAL_KEY).unwrap().as_deref(),
            Some("second")
        );

        repo.remove_setting(SYNC_CREDENTIAL_KEY).unwrap();
        assert_eq!(repo.get_setting(SYNC_CREDENTIAL_KEY).unwrap(), None);
    }
}
