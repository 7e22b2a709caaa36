//! Track command implementations.

use colored::Colorize;

use crate::cli::TrackCommands;
use crate::cli::commands::{open_storage, parse_id};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::Track;

/// Execute track commands.
///
/// # Errors
///
/// Returns an error if the id is malformed or the track does not exist.
pub fn execute(command: &TrackCommands, config: &Config, json: bool) -> Result<()> {
    match command {
        TrackCommands::Show { id } => show(id, config, json),
    }
}

fn show(id: &str, config: &Config, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let storage = open_storage(config)?;
    let track = storage
        .get_track(id)?
        .ok_or_else(|| Error::TrackNotFound { id: id.to_string() })?;

    if json {
        println!("{}", serde_json::to_string(&track)?);
    } else {
        print_track(&track);
    }
    Ok(())
}

/// One-line summary used by the playlist listings too.
pub(crate) fn track_line(track: &Track) -> String {
    let mut line = format!("{}  {}", track.id.to_string().dimmed(), track.display_name());
    if let Some(artist) = &track.artist {
        line.push_str(&format!(" - {artist}"));
    }
    if let Some(album) = &track.album {
        line.push_str(&format!(" ({})", album.italic()));
    }
    line
}

fn print_track(track: &Track) {
    println!("{}", track.display_name().bold());
    println!("  {:<12} {}", "id", track.id);
    let text = [
        ("artist", &track.artist),
        ("album", &track.album),
        ("genre", &track.genre),
        ("location", &track.location),
    ];
    for (label, value) in text {
        if let Some(value) = value {
            println!("  {label:<12} {value}");
        }
    }
    let numbers = [
        ("year", track.year),
        ("rating", track.rating),
        ("plays", track.play_count),
        ("skips", track.skip_count),
        ("time (ms)", track.total_time),
    ];
    for (label, value) in numbers {
        if let Some(value) = value {
            println!("  {label:<12} {value}");
        }
    }
    if let Some(kind) = track.media_kind {
        println!("  {:<12} {kind}", "media kind");
    }
    let dates = [
        ("added", track.date_added),
        ("modified", track.date_modified),
        ("played", track.play_date),
    ];
    for (label, value) in dates {
        if let Some(value) = value {
            println!("  {label:<12} {value}");
        }
    }
}
