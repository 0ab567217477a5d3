//! Runtime configuration: thresholds, paths and the sync gatekeeper.
//!
//! # Responsibility
//! - Provide defaults for every timing rule used by engine, view and sync.
//! - Overlay an optional JSON file and `SHIFTLOG_*` environment variables.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - Loading configuration never touches the database or the network.
//! - Numeric settings are bounded, so the duration accessors cannot overflow.

use crate::store::undo::MAX_UNDO_DEPTH;
use chrono::Duration;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_FILE: &str = "SHIFTLOG_CONFIG";
pub const ENV_DB_PATH: &str = "SHIFTLOG_DB_PATH";
pub const ENV_LOG_DIR: &str = "SHIFTLOG_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "SHIFTLOG_LOG_LEVEL";
pub const ENV_GATEKEEPER_URL: &str = "SHIFTLOG_GATEKEEPER_URL";

const APP_DIR_NAME: &str = "shiftlog";
const DB_FILE_NAME: &str = "shiftlog.sqlite3";
const LOG_DIR_NAME: &str = "logs";

const MAX_AUTO_RESUME_MINUTES: i64 = 24 * 60;
const MAX_UNDO_WINDOW_SECONDS: i64 = 60 * 60;
const MAX_THRESHOLD_HOURS: i64 = 7 * 24;
const MAX_SYNC_TIMEOUT_SECONDS: i64 = 10 * 60;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    /// A numeric setting fell outside `min..=max`.
    InvalidValue {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::InvalidValue {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "config field `{field}` must be within {min}..={max}, got {value}"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidValue { .. } => None,
        }
    }
}

/// Settings shared by the core library and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub auto_resume_threshold_minutes: i64,
    pub undo_window_seconds: i64,
    pub undo_depth: usize,
    pub shift_gap_threshold_hours: i64,
    pub min_rest_hours: i64,
    pub sync_timeout_seconds: u64,
    pub gatekeeper_url: Option<String>,
    pub db_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            auto_resume_threshold_minutes: 5,
            undo_window_seconds: 30,
            undo_depth: 1,
            shift_gap_threshold_hours: 6,
            min_rest_hours: 10,
            sync_timeout_seconds: 30,
            gatekeeper_url: None,
            db_path: None,
            log_dir: None,
            log_level: None,
        }
    }
}

impl CoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source.
    ///
    /// `SHIFTLOG_CONFIG` names a JSON file loaded first; the remaining
    /// variables override individual fields.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = match var(ENV_CONFIG_FILE) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(path) = var(ENV_DB_PATH) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(path));
        }
        if let Some(level) = var(ENV_LOG_LEVEL) {
            config.log_level = Some(level);
        }
        if let Some(url) = var(ENV_GATEKEEPER_URL) {
            config.gatekeeper_url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        let checks = [
            (
                "auto_resume_threshold_minutes",
                self.auto_resume_threshold_minutes,
                MAX_AUTO_RESUME_MINUTES,
            ),
            ("undo_window_seconds", self.undo_window_seconds, MAX_UNDO_WINDOW_SECONDS),
            ("undo_depth", saturating_i64(self.undo_depth as u64), MAX_UNDO_DEPTH as i64),
            ("shift_gap_threshold_hours", self.shift_gap_threshold_hours, MAX_THRESHOLD_HOURS),
            ("min_rest_hours", self.min_rest_hours, MAX_THRESHOLD_HOURS),
            (
                "sync_timeout_seconds",
                saturating_i64(self.sync_timeout_seconds),
                MAX_SYNC_TIMEOUT_SECONDS,
            ),
        ];
        for (field, value, max) in checks {
            if !(1..=max).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field,
                    value,
                    min: 1,
                    max,
                });
            }
        }
        Ok(())
    }

    pub fn auto_resume_threshold(&self) -> Duration {
        Duration::minutes(self.auto_resume_threshold_minutes)
    }

    pub fn undo_window(&self) -> Duration {
        Duration::seconds(self.undo_window_seconds)
    }

    pub fn shift_gap_threshold(&self) -> Duration {
        Duration::hours(self.shift_gap_threshold_hours)
    }

    pub fn min_rest(&self) -> Duration {
        Duration::hours(self.min_rest_hours)
    }

    pub fn sync_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync_timeout_seconds)
    }

    /// Database file: explicit path, else `<data dir>/shiftlog/shiftlog.sqlite3`.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| app_data_dir().join(DB_FILE_NAME))
    }

    /// Log directory: explicit path, else `<data dir>/shiftlog/logs`.
    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| app_data_dir().join(LOG_DIR_NAME))
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use chrono::Duration;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_rules() {
        let config = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.auto_resume_threshold(), Duration::minutes(5));
        assert_eq!(config.undo_window(), Duration::seconds(30));
        assert_eq!(config.undo_depth, 1);
        assert_eq!(config.shift_gap_threshold(), Duration::hours(6));
        assert_eq!(config.min_rest(), Duration::hours(10));
        assert_eq!(config.sync_timeout().as_secs(), 30);
        assert!(config.gatekeeper_url.is_none());
        assert!(config.resolved_db_path().ends_with("shiftlog/shiftlog.sqlite3"));
    }

    #[test]
    fn environment_overrides_paths_and_gatekeeper() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("SHIFTLOG_DB_PATH", "/tmp/shift.db"),
            ("SHIFTLOG_LOG_DIR", " /tmp/shift-logs "),
            ("SHIFTLOG_LOG_LEVEL", "debug"),
            ("SHIFTLOG_GATEKEEPER_URL", "https://gate.example/check"),
        ]))
        .unwrap();
        assert_eq!(config.resolved_db_path(), PathBuf::from("/tmp/shift.db"));
        assert_eq!(config.resolved_log_dir(), PathBuf::from("/tmp/shift-logs"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(
            config.gatekeeper_url.as_deref(),
            Some("https://gate.example/check")
        );
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let config = CoreConfig::from_lookup(lookup(&[("SHIFTLOG_DB_PATH", "   ")])).unwrap();
        assert!(config.db_path.is_none());
    }

    #[test]
    fn config_file_fills_fields_and_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shiftlog.json");
        std::fs::write(
            &path,
            r#"{"undo_depth": 3, "min_rest_hours": 11, "db_path": "/from/file.db"}"#,
        )
        .unwrap();
        let path_str = path.to_str().unwrap().to_string();

        let config = CoreConfig::from_lookup(lookup(&[
            ("SHIFTLOG_CONFIG", path_str.as_str()),
            ("SHIFTLOG_DB_PATH", "/from/env.db"),
        ]))
        .unwrap();
        assert_eq!(config.undo_depth, 3);
        assert_eq!(config.min_rest(), Duration::hours(11));
        assert_eq!(config.auto_resume_threshold_minutes, 5);
        assert_eq!(config.db_path, Some(PathBuf::from("/from/env.db")));
    }

    #[test]
    fn rejects_non_positive_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"undo_window_seconds": 0}"#).unwrap();
        let err = CoreConfig::from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "undo_window_seconds",
                value: 0,
                ..
            }
        ));
    }

    #[test]
    fn rejects_thresholds_too_large_for_durations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.json");
        std::fs::write(&path, r#"{"min_rest_hours": 9000000000000000}"#).unwrap();
        let err = CoreConfig::from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "min_rest_hours",
                max: 168,
                ..
            }
        ));

        std::fs::write(&path, r#"{"undo_depth": 18446744073709551615}"#).unwrap();
        let err = CoreConfig::from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "undo_depth",
                value: i64::MAX,
                ..
            }
        ));
    }

    #[test]
    fn upper_bounds_are_accepted() {
        let config = CoreConfig {
            undo_depth: 10,
            shift_gap_threshold_hours: 168,
            min_rest_hours: 168,
            ..CoreConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.min_rest(), Duration::weeks(1));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            CoreConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
