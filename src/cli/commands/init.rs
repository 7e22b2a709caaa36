//! Create the library database.
//!
//! The database lives at `~/.tunesync/data/tunesync.db` unless `--db` or
//! `TUNESYNC_DB` points elsewhere. Running `init` on an existing database
//! only brings its schema up to date.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::storage::SqliteStorage;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    created: bool,
    tracks: usize,
    playlists: usize,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the directory or database cannot be created.
pub fn execute(config: &Config, force: bool, json: bool) -> Result<()> {
    let db_path = &config.db_path;
    if force && db_path.exists() {
        fs::remove_file(db_path)?;
        for suffix in ["-wal", "-shm"] {
            let mut side = db_path.clone().into_os_string();
            side.push(suffix);
            let side = PathBuf::from(side);
            if side.exists() {
                fs::remove_file(side)?;
            }
        }
    }
    let created = !db_path.exists();

    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let storage = SqliteStorage::open_with_timeout(db_path, Some(config.busy_timeout_ms))?;
    let (tracks, playlists) = storage.counts()?;

    if json {
        let output = InitOutput {
            database: db_path.clone(),
            created,
            tracks,
            playlists,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if created {
        println!("Initialized tunesync database");
        println!("  Database: {}", db_path.display());
        println!();
        println!("Next: run 'tunesync sync <library.jsonl>' to import a library.");
    } else {
        println!("Database already initialized: {}", db_path.display());
        println!("  {tracks} tracks, {playlists} playlists");
    }

    Ok(())
}
