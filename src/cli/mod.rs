//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// tunesync - mirror an iTunes-style library into SQLite
#[derive(Parser, Debug)]
#[command(name = "tunesync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.tunesync/data/tunesync.db)
    #[arg(long, global = true, env = "TUNESYNC_DB")]
    pub db: Option<PathBuf>,

    /// Actor name for audit trail
    #[arg(long, global = true, env = "TUNESYNC_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the library database
    Init {
        /// Delete an existing database first
        #[arg(long)]
        force: bool,
    },

    /// Sync a JSONL library stream into the database
    Sync {
        /// JSONL file, one track or playlist record per line
        file: PathBuf,

        /// Also mirror the master list and built-in playlists
        #[arg(long)]
        include_system: bool,
    },

    /// Inspect tracks
    Track {
        #[command(subcommand)]
        command: TrackCommands,
    },

    /// Inspect and edit playlists
    Playlist {
        #[command(subcommand)]
        command: PlaylistCommands,
    },

    /// Decode and compile smart playlist rules
    Smart {
        #[command(subcommand)]
        command: SmartCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand, Debug)]
pub enum TrackCommands {
    /// Show one track
    Show {
        /// Persistent id (16 hex digits)
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlaylistCommands {
    /// Show one playlist
    Show {
        /// Persistent id (16 hex digits)
        id: String,
    },

    /// List the tracks of a playlist, evaluating smart rules
    Tracks {
        /// Persistent id (16 hex digits)
        id: String,
    },

    /// List playlists inside a folder, or top-level playlists
    Children {
        /// Folder persistent id; omit for the top level
        id: Option<String>,
    },

    /// Delete a playlist (refused while it still has children)
    Delete {
        /// Persistent id (16 hex digits)
        id: String,
    },

    /// Remove tracks from a playlist
    RemoveTracks {
        /// Playlist persistent id
        id: String,

        /// Track persistent ids to remove
        #[arg(required = true)]
        tracks: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SmartCommands {
    /// Decode base64 info and criteria records to JSON
    Decode {
        /// Base64 smart info record
        info: String,

        /// Base64 smart criteria record
        criteria: String,
    },

    /// Compile base64 info and criteria records to SQL
    Sql {
        /// Base64 smart info record
        info: String,

        /// Base64 smart criteria record
        criteria: String,
    },
}
