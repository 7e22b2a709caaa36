//! Error types for tunesync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Recovery hints for the CLI
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

use crate::smart::DecodeError;

/// Result type alias for tunesync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    DatabaseError,

    // Not Found (exit 3)
    TrackNotFound,
    PlaylistNotFound,

    // Validation (exit 4)
    InvalidArgument,
    InvalidPersistentId,
    MissingPersistentId,
    DecodeError,

    // Hierarchy (exit 5)
    CircularPlaylistFolder,
    NoSuchPlaylistFolder,
    ParentNotAFolder,
    PlaylistFolderNotEmpty,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::TrackNotFound => "TRACK_NOT_FOUND",
            Self::PlaylistNotFound => "PLAYLIST_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidPersistentId => "INVALID_PERSISTENT_ID",
            Self::MissingPersistentId => "MISSING_PERSISTENT_ID",
            Self::DecodeError => "DECODE_ERROR",
            Self::CircularPlaylistFolder => "CIRCULAR_PLAYLIST_FOLDER",
            Self::NoSuchPlaylistFolder => "NO_SUCH_PLAYLIST_FOLDER",
            Self::ParentNotAFolder => "PARENT_NOT_A_FOLDER",
            Self::PlaylistFolderNotEmpty => "PLAYLIST_FOLDER_NOT_EMPTY",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::DatabaseError => 2,
            Self::TrackNotFound | Self::PlaylistNotFound => 3,
            Self::InvalidArgument
            | Self::InvalidPersistentId
            | Self::MissingPersistentId
            | Self::DecodeError => 4,
            Self::CircularPlaylistFolder
            | Self::NoSuchPlaylistFolder
            | Self::ParentNotAFolder
            | Self::PlaylistFolderNotEmpty => 5,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying with corrected input can succeed.
    ///
    /// Busy databases are retryable as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument
                | Self::InvalidPersistentId
                | Self::DatabaseError
                | Self::NoSuchPlaylistFolder
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `tunesync init` first")]
    NotInitialized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Smart playlist decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid persistent id: {0}")]
    InvalidPersistentId(String),

    #[error("Track not found: {id}")]
    TrackNotFound { id: String },

    #[error("Playlist not found: {id}")]
    PlaylistNotFound { id: String },

    #[error("Playlist {id} cannot be placed under {parent}: folders would form a cycle")]
    CircularPlaylistFolder { id: String, parent: String },

    #[error("Parent folder {parent} of playlist {id} does not exist")]
    NoSuchPlaylistFolder { id: String, parent: String },

    #[error("Parent {parent} of playlist {id} is not a folder")]
    ParentNotAFolder { id: String, parent: String },

    #[error("Playlist folder {id} is not empty")]
    PlaylistFolderNotEmpty { id: String },

    #[error("Record has no persistent id")]
    MissingPersistentId,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Decode(_) => ErrorCode::DecodeError,
            Self::InvalidPersistentId(_) => ErrorCode::InvalidPersistentId,
            Self::TrackNotFound { .. } => ErrorCode::TrackNotFound,
            Self::PlaylistNotFound { .. } => ErrorCode::PlaylistNotFound,
            Self::CircularPlaylistFolder { .. } => ErrorCode::CircularPlaylistFolder,
            Self::NoSuchPlaylistFolder { .. } => ErrorCode::NoSuchPlaylistFolder,
            Self::ParentNotAFolder { .. } => ErrorCode::ParentNotAFolder,
            Self::PlaylistFolderNotEmpty { .. } => ErrorCode::PlaylistFolderNotEmpty,
            Self::MissingPersistentId => ErrorCode::MissingPersistentId,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Recovery hint, or `None` if there is nothing actionable to say.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `tunesync init` to create the database".to_string())
            }
            Self::InvalidPersistentId(_) => {
                Some("Persistent ids are 16 hexadecimal digits, e.g. 2F1C3B5A7D9E0F11".to_string())
            }
            Self::TrackNotFound { .. } | Self::PlaylistNotFound { .. } => Some(
                "Run `tunesync sync <file>` to import the library first".to_string(),
            ),
            Self::PlaylistFolderNotEmpty { id } => Some(format!(
                "Move or delete the playlists inside {id} first. \
                 Use `tunesync playlist children {id}` to list them."
            )),
            Self::NoSuchPlaylistFolder { .. } => Some(
                "Sync the parent folder before its children, or retry once the folder exists"
                    .to_string(),
            ),
            Self::Decode(_) => Some(
                "Pass the smart info and criteria blobs exactly as they appear in the library file"
                    .to_string(),
            ),
            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::CircularPlaylistFolder { .. }
            | Self::ParentNotAFolder { .. }
            | Self::MissingPersistentId
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::NotInitialized.exit_code(), 2);
        assert_eq!(Error::TrackNotFound { id: "x".into() }.exit_code(), 3);
        assert_eq!(Error::InvalidArgument("x".into()).exit_code(), 4);
        assert_eq!(Error::PlaylistFolderNotEmpty { id: "x".into() }.exit_code(), 5);
        assert_eq!(Error::Other("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_structured_json() {
        let err = Error::PlaylistFolderNotEmpty {
            id: "00000000000000AA".into(),
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "PLAYLIST_FOLDER_NOT_EMPTY");
        assert_eq!(json["error"]["exit_code"], 5);
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("00000000000000AA"));
    }

    #[test]
    fn test_decode_error_converts() {
        let err: Error = DecodeError::UnknownFieldType(7).into();
        assert_eq!(err.error_code(), ErrorCode::DecodeError);
    }
}
