//! Playlist model.

use rusqlite::types::ToSql;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::external::ExternalPlaylist;
use crate::model::{PersistentId, PlaylistKind, Timestamp};
use crate::smart::{decode_smart, Smart};
use crate::sync::merge::three_way_merge;

/// Persisted playlist columns after `id`. Track membership lives in
/// `playlist_track`.
pub const PLAYLIST_COLUMNS: &[&str] = &[
    "parent_id",
    "kind",
    "folder",
    "name",
    "date_added",
    "date_modified",
    "smart",
    "genius_track_id",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PersistentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<PersistentId>,
    pub kind: PlaylistKind,
    #[serde(default)]
    pub folder: bool,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart: Option<Smart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genius_track_id: Option<PersistentId>,
    #[serde(default)]
    pub track_ids: Vec<PersistentId>,
}

/// Outcome of merging an external change into a local playlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaylistUpdate {
    /// Any column or the track list changed.
    pub changed: bool,
    /// The parent pointer changed; the folder hierarchy must be rechecked.
    pub parent_changed: bool,
    /// Local and external track order both diverged and could not be merged.
    /// The external order was adopted.
    pub conflict: bool,
    /// Folder-ness or smart-ness differs; nothing was applied.
    pub refused: bool,
}

fn distinguished_kind(code: i64) -> PlaylistKind {
    match code {
        2 => PlaylistKind::Movies,
        3 => PlaylistKind::TvShows,
        4 => PlaylistKind::Music,
        5 => PlaylistKind::Audiobooks,
        10 => PlaylistKind::Podcasts,
        19 => PlaylistKind::Purchased,
        65 => PlaylistKind::DownloadedMusic,
        66 => PlaylistKind::DownloadedMovies,
        67 => PlaylistKind::DownloadedTvShows,
        n => PlaylistKind::Other(1000 + n),
    }
}

impl Playlist {
    #[must_use]
    pub fn new(id: PersistentId, name: impl Into<String>, kind: PlaylistKind) -> Self {
        Self {
            id,
            parent_id: None,
            kind,
            folder: kind == PlaylistKind::Folder,
            name: name.into(),
            date_added: None,
            date_modified: None,
            smart: None,
            genius_track_id: None,
            track_ids: Vec::new(),
        }
    }

    /// Build a playlist from a row selected with `playlist.*`. Track ids are
    /// loaded separately.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            parent_id: row.get("parent_id")?,
            kind: row.get("kind")?,
            folder: row.get("folder")?,
            name: row.get("name")?,
            date_added: row.get("date_added")?,
            date_modified: row.get("date_modified")?,
            smart: row.get("smart")?,
            genius_track_id: row.get("genius_track_id")?,
            track_ids: Vec::new(),
        })
    }

    /// Parameters in `id, PLAYLIST_COLUMNS...` order.
    #[must_use]
    pub fn to_params(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.id as &dyn ToSql,
            &self.parent_id as &dyn ToSql,
            &self.kind as &dyn ToSql,
            &self.folder as &dyn ToSql,
            &self.name as &dyn ToSql,
            &self.date_added as &dyn ToSql,
            &self.date_modified as &dyn ToSql,
            &self.smart as &dyn ToSql,
            &self.genius_track_id as &dyn ToSql,
        ]
    }

    #[must_use]
    pub fn is_smart(&self) -> bool {
        self.smart.is_some()
    }

    /// Folders and smart playlists have no stored track list.
    #[must_use]
    pub fn stores_tracks(&self) -> bool {
        !self.folder && self.smart.is_none()
    }

    /// Convert an external record into a local row.
    ///
    /// A smart definition that fails to decode, or that has no rules, leaves
    /// the playlist as an ordinary list of its external track ids.
    pub fn from_external(ext: &ExternalPlaylist) -> Result<Self> {
        let id = ext.persistent_id.ok_or(Error::MissingPersistentId)?;
        let folder = ext.is_folder();
        let mut smart = None;
        if ext.is_smart() {
            let info = ext.smart_info.as_deref().unwrap_or_default();
            let criteria = ext.smart_criteria.as_deref().unwrap_or_default();
            match decode_smart(info, criteria) {
                Ok(decoded) if !decoded.ruleset.rules.is_empty() => smart = Some(decoded),
                Ok(_) => debug!(playlist = %id, "smart playlist has no rules"),
                Err(e) => warn!(playlist = %id, error = %e, "cannot decode smart playlist"),
            }
        }

        let flag = |v: Option<bool>| v.unwrap_or(false);
        let kind = if flag(ext.master) {
            PlaylistKind::Master
        } else if flag(ext.music) {
            PlaylistKind::Music
        } else if flag(ext.movies) {
            PlaylistKind::Movies
        } else if flag(ext.tv_shows) {
            PlaylistKind::TvShows
        } else if flag(ext.podcasts) {
            PlaylistKind::Podcasts
        } else if flag(ext.purchased_music) {
            PlaylistKind::PurchasedMusic
        } else if flag(ext.audiobooks) {
            PlaylistKind::Audiobooks
        } else if let Some(code) = ext.distinguished_kind {
            distinguished_kind(code)
        } else if folder {
            PlaylistKind::Folder
        } else if ext.genius_track_id.is_some() {
            PlaylistKind::Genius
        } else if smart.is_some() {
            PlaylistKind::Smart
        } else {
            PlaylistKind::Standard
        };

        let track_ids = if folder || smart.is_some() {
            Vec::new()
        } else {
            ext.track_ids.clone()
        };

        Ok(Self {
            id,
            parent_id: ext.parent_persistent_id,
            kind,
            folder,
            name: ext.name.clone().unwrap_or_default(),
            date_added: ext.date_added,
            date_modified: ext.date_modified,
            smart,
            genius_track_id: ext.genius_track_id,
            track_ids,
        })
    }

    /// Merge an external change into this (local) playlist.
    ///
    /// `orig` is the external state at the previous sync, `cur` the external
    /// state now.
    pub fn update(&mut self, orig: &Self, cur: &Self, now: Timestamp) -> PlaylistUpdate {
        let mut out = PlaylistUpdate::default();
        if self.folder != cur.folder || self.is_smart() != cur.is_smart() {
            out.refused = true;
            return out;
        }

        if orig.smart != cur.smart && self.smart != cur.smart {
            self.smart.clone_from(&cur.smart);
            out.changed = true;
        }
        if orig.name != cur.name && self.name != cur.name {
            self.name.clone_from(&cur.name);
            out.changed = true;
        }
        if let Some(added) = cur.date_added {
            if self.date_added.is_none_or(|local| added < local) {
                self.date_added = Some(added);
                out.changed = true;
            }
        }

        if orig.track_ids != cur.track_ids {
            let merged = if self.track_ids == orig.track_ids {
                cur.track_ids.clone()
            } else {
                let (merged, ok) = three_way_merge(&orig.track_ids, &self.track_ids, &cur.track_ids);
                if !ok {
                    warn!(
                        playlist = %self.id,
                        local = self.track_ids.len(),
                        incoming = cur.track_ids.len(),
                        "track order conflict, keeping incoming order"
                    );
                    out.conflict = true;
                }
                merged
            };
            if merged != self.track_ids {
                self.track_ids = merged;
                out.changed = true;
            }
        }

        if orig.parent_id != cur.parent_id && self.parent_id != cur.parent_id {
            self.parent_id = cur.parent_id;
            out.parent_changed = true;
            out.changed = true;
        }

        if out.changed {
            self.date_modified = Some(now);
        }
        out
    }
}
