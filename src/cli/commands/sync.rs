//! Sync command implementation.
//!
//! Streams a JSONL library file through the sync engine. Change events go
//! over a bounded channel to a consumer thread that logs and counts them.

use std::path::Path;
use std::thread;

use serde::Serialize;
use tracing::debug;

use crate::cli::commands::open_storage;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::SystemClock;
use crate::sync::{read_records, ChangeType, ChannelSink, SyncEngine, SyncStats};

#[derive(Debug, Default, Serialize)]
struct ChangeCounts {
    created: usize,
    changed: usize,
    deleted: usize,
    dropped: usize,
}

#[derive(Serialize)]
struct SyncOutput<'a> {
    file: &'a Path,
    stats: SyncStats,
    events: ChangeCounts,
}

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if the database is missing, the file cannot be opened,
/// or a write fails. Records committed before a failure stay committed.
pub fn execute(config: &Config, file: &Path, include_system: bool, json: bool) -> Result<()> {
    let mut storage = open_storage(config)?;
    let records = read_records(file)?;
    let config = Config {
        skip_system_playlists: !include_system,
        ..config.clone()
    };

    let (stats, events) = thread::scope(|s| {
        let (sink, rx) = ChannelSink::new(config.event_buffer);
        let consumer = s.spawn(move || {
            let mut counts = ChangeCounts::default();
            for event in rx {
                debug!(kind = %event.kind, id = %event.id, change = ?event.change, "change");
                match event.change {
                    ChangeType::Created => counts.created += 1,
                    ChangeType::Changed => counts.changed += 1,
                    ChangeType::Deleted => counts.deleted += 1,
                }
            }
            counts
        });

        let result =
            SyncEngine::new(&mut storage, &config, &SystemClock, &sink).sync_stream(records);
        let dropped = sink.dropped();
        drop(sink);
        let mut counts = consumer
            .join()
            .map_err(|_| Error::Other("change event consumer panicked".to_string()))?;
        counts.dropped = dropped;
        result.map(|stats| (stats, counts))
    })?;

    if json {
        let output = SyncOutput {
            file,
            stats,
            events,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if stats.aborted {
        println!("Sync aborted early: {}", file.display());
    } else {
        println!("Sync complete: {}", file.display());
    }
    println!();
    for (label, s) in [("Tracks", stats.tracks), ("Playlists", stats.playlists)] {
        println!(
            "  {label:<10} {} created, {} updated, {} unchanged, {} skipped, {} deleted",
            s.created, s.updated, s.unchanged, s.skipped, s.deleted
        );
    }
    if stats.playlists.conflicts > 0 {
        println!(
            "  {} playlist order conflicts resolved in favour of the library file",
            stats.playlists.conflicts
        );
    }
    if events.dropped > 0 {
        println!("  {} change events dropped", events.dropped);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sync_requires_init() {
        let dir = TempDir::new().unwrap();
        let config = Config::for_path(dir.path().join("missing.db"));
        let file = dir.path().join("lib.jsonl");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            execute(&config, &file, false, true),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_sync_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::for_path(dir.path().join("lib.db"));
        crate::cli::commands::init::execute(&config, false, true).unwrap();

        let file = dir.path().join("lib.jsonl");
        fs::write(
            &file,
            concat!(
                r#"{"type":"track","persistent_id":"0000000000000001","name":"A","location":"file:///a.mp3"}"#,
                "\n",
                r#"{"type":"playlist","persistent_id":"0000000000000010","name":"Mix","track_ids":["0000000000000001"]}"#,
                "\n",
            ),
        )
        .unwrap();
        execute(&config, &file, false, true).unwrap();

        let storage = open_storage(&config).unwrap();
        assert_eq!(storage.counts().unwrap(), (1, 1));
    }
}
