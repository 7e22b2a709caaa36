//! Data models for the mirrored library.
//!
//! This module contains the domain types shared by storage and sync:
//! - Track and Playlist rows
//! - External records as read from the library file
//! - Identifiers, timestamps and kind enumerations

pub mod enums;
pub mod external;
pub mod persistent_id;
pub mod playlist;
pub mod sort;
pub mod time;
pub mod track;

pub use enums::{MediaKind, PlaylistKind};
pub use external::{ExternalPlaylist, ExternalRecord, ExternalTrack};
pub use persistent_id::PersistentId;
pub use playlist::{Playlist, PlaylistUpdate, PLAYLIST_COLUMNS};
pub use sort::{make_sort, make_sort_artist};
pub use time::{Clock, FixedClock, SystemClock, Timestamp};
pub use track::{MergePolicy, Track, TRACK_COLUMNS};
