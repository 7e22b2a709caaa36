//! Playlist command implementations.

use colored::Colorize;
use serde::Serialize;

use crate::cli::PlaylistCommands;
use crate::cli::commands::track::track_line;
use crate::cli::commands::{open_storage, parse_id};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Playlist, Timestamp, Track};
use crate::smart::{compile_smart, CompileContext};

#[derive(Serialize)]
struct TracksOutput<'a> {
    playlist: &'a str,
    count: usize,
    tracks: &'a [Track],
}

#[derive(Serialize)]
struct ChildrenOutput<'a> {
    parent: Option<String>,
    count: usize,
    playlists: &'a [Playlist],
}

#[derive(Serialize)]
struct DeleteOutput {
    id: String,
    deleted: bool,
}

#[derive(Serialize)]
struct RemoveTracksOutput {
    id: String,
    removed: usize,
}

/// Execute playlist commands.
///
/// # Errors
///
/// Returns an error if an id is malformed, the playlist does not exist, or
/// a delete is refused.
pub fn execute(command: &PlaylistCommands, config: &Config, json: bool) -> Result<()> {
    match command {
        PlaylistCommands::Show { id } => show(id, config, json),
        PlaylistCommands::Tracks { id } => tracks(id, config, json),
        PlaylistCommands::Children { id } => children(id.as_deref(), config, json),
        PlaylistCommands::Delete { id } => delete(id, config, json),
        PlaylistCommands::RemoveTracks { id, tracks } => remove_tracks(id, tracks, config, json),
    }
}

fn show(id: &str, config: &Config, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let storage = open_storage(config)?;
    let playlist = storage
        .get_playlist(id)?
        .ok_or_else(|| Error::PlaylistNotFound { id: id.to_string() })?;

    if json {
        println!("{}", serde_json::to_string(&playlist)?);
        return Ok(());
    }

    println!("{} [{}]", playlist.name.bold(), playlist.kind);
    println!("  {:<10} {}", "id", playlist.id);
    if let Some(parent) = playlist.parent_id {
        println!("  {:<10} {parent}", "parent");
    }
    if let Some(added) = playlist.date_added {
        println!("  {:<10} {added}", "added");
    }
    if let Some(smart) = &playlist.smart {
        let query = compile_smart(smart, &CompileContext::new(Timestamp::now()));
        println!("  {:<10} {}", "rules", query.where_sql);
        for warning in &query.warnings {
            println!("  {:<10} {}", "warning", warning.yellow());
        }
    } else if !playlist.folder {
        println!("  {:<10} {}", "tracks", playlist.track_ids.len());
    }
    Ok(())
}

fn tracks(id: &str, config: &Config, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let storage = open_storage(config)?;
    let tracks = storage.playlist_tracks(id, Timestamp::now())?;

    if json {
        let key = id.to_string();
        let output = TracksOutput {
            playlist: &key,
            count: tracks.len(),
            tracks: &tracks,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if tracks.is_empty() {
        println!("No tracks.");
        return Ok(());
    }
    for (i, track) in tracks.iter().enumerate() {
        println!("{:>4}. {}", i + 1, track_line(track));
    }
    Ok(())
}

fn children(id: Option<&str>, config: &Config, json: bool) -> Result<()> {
    let parent = id.map(parse_id).transpose()?;
    let storage = open_storage(config)?;
    if let Some(parent) = parent {
        if storage.get_playlist(parent)?.is_none() {
            return Err(Error::PlaylistNotFound {
                id: parent.to_string(),
            });
        }
    }
    let playlists = storage.child_playlists(parent)?;

    if json {
        let output = ChildrenOutput {
            parent: parent.map(|p| p.to_string()),
            count: playlists.len(),
            playlists: &playlists,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if playlists.is_empty() {
        println!("No playlists.");
        return Ok(());
    }
    for playlist in &playlists {
        let name = if playlist.folder {
            format!("{}/", playlist.name).bold().to_string()
        } else {
            playlist.name.clone()
        };
        println!("{}  {name} [{}]", playlist.id.to_string().dimmed(), playlist.kind);
    }
    Ok(())
}

fn delete(id: &str, config: &Config, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let mut storage = open_storage(config)?;
    storage.delete_playlist(id, &config.actor)?;

    if json {
        let output = DeleteOutput {
            id: id.to_string(),
            deleted: true,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Deleted playlist: {id}");
    }
    Ok(())
}

fn remove_tracks(id: &str, tracks: &[String], config: &Config, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let track_ids = tracks
        .iter()
        .map(|t| parse_id(t))
        .collect::<Result<Vec<_>>>()?;
    let mut storage = open_storage(config)?;
    let removed = storage.delete_tracks_from_playlist(id, &track_ids, &config.actor)?;

    if json {
        let output = RemoveTracksOutput {
            id: id.to_string(),
            removed,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Removed {removed} entries from playlist {id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PersistentId, PlaylistKind};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config::for_path(dir.path().join("lib.db"));
        crate::cli::commands::init::execute(&config, false, true).unwrap();
        (dir, config)
    }

    #[test]
    fn test_delete_refused_for_non_empty_folder() {
        let (_dir, config) = setup();
        let mut storage = open_storage(&config).unwrap();
        let mut folder = Playlist::new(PersistentId(1), "Folder", PlaylistKind::Folder);
        folder.folder = true;
        storage.save_playlist(&folder, "test").unwrap();
        let mut child = Playlist::new(PersistentId(2), "Child", PlaylistKind::Standard);
        child.parent_id = Some(PersistentId(1));
        storage.save_playlist(&child, "test").unwrap();
        drop(storage);

        let err = delete("0000000000000001", &config, true).unwrap_err();
        assert!(matches!(err, Error::PlaylistFolderNotEmpty { .. }));
        delete("0000000000000002", &config, true).unwrap();
        delete("0000000000000001", &config, true).unwrap();
    }

    #[test]
    fn test_missing_playlist() {
        let (_dir, config) = setup();
        assert!(matches!(
            show("00000000000000FF", &config, true),
            Err(Error::PlaylistNotFound { .. })
        ));
        assert!(matches!(
            children(Some("00000000000000FF"), &config, true),
            Err(Error::PlaylistNotFound { .. })
        ));
        assert!(matches!(
            show("not hex", &config, true),
            Err(Error::InvalidPersistentId(_))
        ));
    }
}
