//! Command implementations.

pub mod completions;
pub mod init;
pub mod playlist;
pub mod smart;
pub mod sync;
pub mod track;
pub mod version;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::PersistentId;
use crate::storage::SqliteStorage;

/// Open the configured database. It must already exist.
fn open_storage(config: &Config) -> Result<SqliteStorage> {
    if !config.db_path.exists() {
        return Err(Error::NotInitialized);
    }
    SqliteStorage::open_with_timeout(&config.db_path, Some(config.busy_timeout_ms))
}

fn parse_id(s: &str) -> Result<PersistentId> {
    s.parse()
}
