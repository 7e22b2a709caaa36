//! Records as they arrive from the external library file.
//!
//! These mirror the library file's own keys. Every field is optional because
//! the file omits keys freely. The serialized form of these structs is the
//! change-detection snapshot, so field order here is part of the snapshot
//! format and fields that are local to one export of the file (the integer
//! track and playlist ids) are never serialized.

use serde::{Deserialize, Serialize};

use crate::model::{PersistentId, Timestamp};

/// One entry in the library stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExternalRecord {
    Track(ExternalTrack),
    Playlist(ExternalPlaylist),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalTrack {
    #[serde(skip_serializing)]
    pub track_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_id: Option<PersistentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_rating: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_video: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_of_gapless_album: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podcast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchased: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_album_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_composer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tv_show: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_adjustment: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
}

impl ExternalTrack {
    /// Disabled tracks and tracks with no file are not mirrored.
    #[must_use]
    pub fn is_importable(&self) -> bool {
        !self.disabled.unwrap_or(false) && self.location.as_deref().is_some_and(|l| !l.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalPlaylist {
    #[serde(skip_serializing)]
    pub playlist_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_id: Option<PersistentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_persistent_id: Option<PersistentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_items: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movies: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tv_shows: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podcasts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audiobooks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchased_music: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinguished_kind: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genius_track_id: Option<PersistentId>,
    /// Base64 text of the smart playlist info record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_info: Option<String>,
    /// Base64 text of the smart playlist criteria record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_criteria: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub track_ids: Vec<PersistentId>,
}

impl ExternalPlaylist {
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.folder.unwrap_or(false)
    }

    #[must_use]
    pub fn is_smart(&self) -> bool {
        if self.is_folder() || self.genius_track_id.is_some() {
            return false;
        }
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.smart_info) && present(&self.smart_criteria)
    }

    /// The master library list and the application's built-in lists.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.master.unwrap_or(false)
            || self.music.unwrap_or(false)
            || self.movies.unwrap_or(false)
            || self.tv_shows.unwrap_or(false)
            || self.podcasts.unwrap_or(false)
            || self.audiobooks.unwrap_or(false)
            || self.purchased_music.unwrap_or(false)
            || self.distinguished_kind.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ids_excluded_from_serialization() {
        let a = ExternalTrack {
            track_id: Some(1),
            persistent_id: Some(PersistentId(7)),
            name: Some("Song".into()),
            ..Default::default()
        };
        let b = ExternalTrack {
            track_id: Some(99),
            ..a.clone()
        };
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
    }

    #[test]
    fn test_record_tagging() {
        let line = r#"{"type":"playlist","persistent_id":"00000000000000AA","name":"Mix","track_ids":["0000000000000001"]}"#;
        let rec: ExternalRecord = serde_json::from_str(line).unwrap();
        match rec {
            ExternalRecord::Playlist(p) => {
                assert_eq!(p.persistent_id, Some(PersistentId(0xAA)));
                assert_eq!(p.track_ids, vec![PersistentId(1)]);
            }
            ExternalRecord::Track(_) => panic!("expected playlist"),
        }
    }

    #[test]
    fn test_importable() {
        let mut t = ExternalTrack {
            location: Some("file:///a.mp3".into()),
            ..Default::default()
        };
        assert!(t.is_importable());
        t.disabled = Some(true);
        assert!(!t.is_importable());
        t.disabled = None;
        t.location = None;
        assert!(!t.is_importable());
    }

    #[test]
    fn test_is_smart_requires_both_records() {
        let mut p = ExternalPlaylist {
            smart_info: Some("AQ==".into()),
            ..Default::default()
        };
        assert!(!p.is_smart());
        p.smart_criteria = Some("AQ==".into());
        assert!(p.is_smart());
        p.folder = Some(true);
        assert!(!p.is_smart());
    }
}
