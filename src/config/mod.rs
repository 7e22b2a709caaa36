//! Configuration.
//!
//! [`Config`] is built once at process start from flags and environment and
//! passed by reference into the sync engine and the read paths. Nothing here
//! is process-global.
//!
//! The database lives at `~/.tunesync/data/tunesync.db` unless overridden.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default capacity of the change-event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    /// Name recorded in the audit trail.
    pub actor: String,
    /// Library owner whose stream is being synced. Snapshots and pruning are
    /// scoped to it.
    pub owner_id: Option<i64>,
    /// Skip the master list and other built-in playlists during sync.
    pub skip_system_playlists: bool,
    /// Capacity of the bounded change-event channel.
    pub event_buffer: usize,
    pub busy_timeout_ms: u64,
}

impl Config {
    /// Build a config from CLI flags, falling back to the environment.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no database location can be determined or
    /// `TUNESYNC_OWNER` is not an integer.
    pub fn resolve(db: Option<&Path>, actor: Option<&str>) -> Result<Self> {
        let db_path = resolve_db_path(db)
            .ok_or_else(|| Error::Config("cannot determine home directory for the database".into()))?;
        let owner_id = match std::env::var("TUNESYNC_OWNER") {
            Ok(v) if !v.trim().is_empty() => Some(
                v.trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("TUNESYNC_OWNER is not an integer: {v}")))?,
            ),
            _ => None,
        };
        Ok(Self {
            db_path,
            actor: actor.map_or_else(default_actor, str::to_string),
            owner_id,
            ..Self::for_path(PathBuf::new())
        })
    }

    /// Defaults for a database at `db_path`.
    #[must_use]
    pub fn for_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            actor: "tunesync".to_string(),
            owner_id: None,
            skip_system_playlists: true,
            event_buffer: DEFAULT_EVENT_BUFFER,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Get the global tunesync directory, `~/.tunesync/`.
#[must_use]
pub fn global_tunesync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".tunesync"))
}

fn truthy(v: &str) -> bool {
    !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
}

/// Test mode is enabled by setting `TUNESYNC_TEST_MODE=1` (or any non-empty
/// value other than `0`/`false`).
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("TUNESYNC_TEST_MODE").is_ok_and(|v| truthy(&v))
}

/// `~/.tunesync/test/tunesync.db`, kept apart from the real library.
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_tunesync_dir().map(|dir| dir.join("test").join("tunesync.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `TUNESYNC_DB` environment variable
/// 3. `TUNESYNC_TEST_MODE` → test database
/// 4. Global location: `~/.tunesync/data/tunesync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("TUNESYNC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    if is_test_mode() {
        return test_db_path();
    }

    global_tunesync_dir().map(|dir| dir.join("data").join("tunesync.db"))
}

/// Get the default actor name.
///
/// Priority:
/// 1. `TUNESYNC_ACTOR` environment variable
/// 2. System username
/// 3. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("TUNESYNC_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return user;
        }
    }

    "unknown".to_string()
}
