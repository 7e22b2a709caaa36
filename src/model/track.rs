//! Track model and its column table.
//!
//! `TRACK_COLUMNS` is the single list of persisted track fields. Each entry
//! names the column and the policy used when an external change is merged
//! into the local row, so storage, decoding and merging all read from the
//! same table.

use chrono::{TimeZone, Utc};
use rusqlite::types::ToSql;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::external::ExternalTrack;
use crate::model::sort::{make_sort, make_sort_artist};
use crate::model::{MediaKind, PersistentId, Timestamp};

/// How an external change to one field is folded into the local row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Adopt the external value whenever it changed, including to "unset".
    Overwrite,
    /// Adopt the external value when it changed to something set.
    OverwriteIfPresent,
    /// Add the positive external delta to the local value.
    Accumulate,
    /// Keep the earlier of the local and external values.
    Earliest,
    /// Keep the later of the local and external values.
    Latest,
    /// Maintained locally; never taken from the external record.
    Local,
}

/// A value that can live in a track column.
pub trait FieldValue: Clone + PartialEq + PartialOrd {
    /// `local + (cur - orig)` when the difference is positive.
    fn accumulate(_local: Option<&Self>, _orig: Option<&Self>, _cur: Option<&Self>) -> Option<Self> {
        None
    }
}

impl FieldValue for String {}
impl FieldValue for bool {}
impl FieldValue for Timestamp {}
impl FieldValue for MediaKind {}

impl FieldValue for i64 {
    fn accumulate(local: Option<&Self>, orig: Option<&Self>, cur: Option<&Self>) -> Option<Self> {
        let delta = cur.copied().unwrap_or(0) - orig.copied().unwrap_or(0);
        (delta > 0).then(|| local.copied().unwrap_or(0) + delta)
    }
}

impl MergePolicy {
    /// Merge one field. Returns true if the local value changed.
    pub fn apply<T: FieldValue>(self, local: &mut Option<T>, orig: &Option<T>, cur: &Option<T>) -> bool {
        let next = match self {
            Self::Overwrite => (orig != cur).then(|| cur.clone()),
            Self::OverwriteIfPresent => (orig != cur && cur.is_some()).then(|| cur.clone()),
            Self::Accumulate => {
                T::accumulate(local.as_ref(), orig.as_ref(), cur.as_ref()).map(Some)
            }
            Self::Earliest => match (local.as_ref(), cur.as_ref()) {
                (None, Some(_)) => Some(cur.clone()),
                (Some(l), Some(c)) if c < l => Some(cur.clone()),
                _ => None,
            },
            Self::Latest => match (local.as_ref(), cur.as_ref()) {
                (None, Some(_)) => Some(cur.clone()),
                (Some(l), Some(c)) if c > l => Some(cur.clone()),
                _ => None,
            },
            Self::Local => None,
        };
        match next {
            Some(value) if value != *local => {
                *local = value;
                true
            }
            _ => false,
        }
    }
}

macro_rules! track_columns {
    ($($field:ident: $ty:ty => $policy:ident,)+) => {
        /// A track row. Every column except the id is optional.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct Track {
            pub id: PersistentId,
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )+
        }

        /// Persisted track columns after `id`, with their merge policies.
        pub const TRACK_COLUMNS: &[(&str, MergePolicy)] = &[
            $((stringify!($field), MergePolicy::$policy),)+
        ];

        impl Track {
            /// Build a track from a row selected with `track.*`.
            pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
                Ok(Self {
                    id: row.get("id")?,
                    $($field: row.get(stringify!($field))?,)+
                })
            }

            /// Parameters in `id, TRACK_COLUMNS...` order.
            #[must_use]
            pub fn to_params(&self) -> Vec<&dyn ToSql> {
                vec![&self.id as &dyn ToSql, $(&self.$field as &dyn ToSql,)+]
            }

            fn merge_columns(&mut self, orig: &Self, cur: &Self) -> Vec<&'static str> {
                let mut changed = Vec::new();
                $(
                    if MergePolicy::$policy.apply(&mut self.$field, &orig.$field, &cur.$field) {
                        changed.push(stringify!($field));
                    }
                )+
                changed
            }
        }
    };
}

track_columns! {
    album: String => OverwriteIfPresent,
    album_artist: String => OverwriteIfPresent,
    album_rating: i64 => OverwriteIfPresent,
    artist: String => OverwriteIfPresent,
    bitrate: i64 => OverwriteIfPresent,
    bpm: i64 => OverwriteIfPresent,
    comments: String => Overwrite,
    compilation: bool => Overwrite,
    composer: String => OverwriteIfPresent,
    date_added: Timestamp => Earliest,
    date_modified: Timestamp => Local,
    disc_count: i64 => OverwriteIfPresent,
    disc_number: i64 => OverwriteIfPresent,
    gapless: bool => Overwrite,
    genre: String => OverwriteIfPresent,
    grouping: String => OverwriteIfPresent,
    kind: String => OverwriteIfPresent,
    location: String => OverwriteIfPresent,
    loved: bool => Overwrite,
    media_kind: MediaKind => OverwriteIfPresent,
    movement_count: i64 => OverwriteIfPresent,
    movement_name: String => OverwriteIfPresent,
    movement_number: i64 => OverwriteIfPresent,
    name: String => OverwriteIfPresent,
    play_count: i64 => Accumulate,
    play_date: Timestamp => Latest,
    purchase_date: Timestamp => OverwriteIfPresent,
    purchased: bool => Overwrite,
    rating: i64 => Overwrite,
    release_date: Timestamp => OverwriteIfPresent,
    sample_rate: i64 => OverwriteIfPresent,
    size: i64 => OverwriteIfPresent,
    skip_count: i64 => Accumulate,
    skip_date: Timestamp => Latest,
    sort_album: String => OverwriteIfPresent,
    sort_album_artist: String => OverwriteIfPresent,
    sort_artist: String => OverwriteIfPresent,
    sort_composer: String => OverwriteIfPresent,
    sort_genre: String => OverwriteIfPresent,
    sort_name: String => OverwriteIfPresent,
    total_time: i64 => OverwriteIfPresent,
    track_count: i64 => OverwriteIfPresent,
    track_number: i64 => OverwriteIfPresent,
    volume_adjustment: i64 => Overwrite,
    work: String => OverwriteIfPresent,
    year: i64 => OverwriteIfPresent,
}

fn sort_of(explicit: Option<&String>, value: Option<&String>, f: fn(&str) -> String) -> Option<String> {
    explicit
        .or(value)
        .map(|s| f(s))
        .filter(|s| !s.is_empty())
}

fn end_of_year(year: i64) -> Option<Timestamp> {
    let year = i32::try_from(year).ok()?;
    Utc.with_ymd_and_hms(year, 12, 31, 23, 59, 59)
        .single()
        .map(|dt| Timestamp::from(dt).add_millis(999))
}

impl Track {
    /// Convert an external record into a local row.
    pub fn from_external(ext: &ExternalTrack) -> Result<Self> {
        let id = ext.persistent_id.ok_or(Error::MissingPersistentId)?;
        let location = ext.location.clone().filter(|l| !l.is_empty());
        let mut media_kind = MediaKind::from_flags(
            ext.movie.unwrap_or(false),
            ext.podcast.unwrap_or(false),
            ext.tv_show.unwrap_or(false),
            ext.music_video.unwrap_or(false),
        );
        if media_kind == MediaKind::MUSIC
            && location.as_deref().is_some_and(|l| l.to_ascii_lowercase().ends_with(".m4b"))
        {
            media_kind = MediaKind::AUDIOBOOK;
        }

        let mut track = Self {
            id,
            album: ext.album.clone(),
            album_artist: ext.album_artist.clone(),
            album_rating: ext.album_rating,
            artist: ext.artist.clone(),
            bitrate: ext.bit_rate,
            bpm: ext.bpm,
            comments: ext.comments.clone(),
            compilation: ext.compilation,
            composer: ext.composer.clone(),
            date_added: ext.date_added,
            date_modified: ext.date_modified,
            disc_count: ext.disc_count,
            disc_number: ext.disc_number,
            gapless: ext.part_of_gapless_album,
            genre: ext.genre.clone(),
            grouping: ext.grouping.clone(),
            kind: ext.kind.clone(),
            location,
            loved: ext.loved,
            media_kind: Some(media_kind),
            movement_count: ext.movement_count,
            movement_name: ext.movement_name.clone(),
            movement_number: ext.movement_number,
            name: ext.name.clone(),
            play_count: ext.play_count,
            play_date: ext.play_date,
            purchase_date: ext.purchase_date,
            purchased: ext.purchased,
            rating: ext.rating,
            release_date: ext.release_date.or_else(|| ext.year.and_then(end_of_year)),
            sample_rate: ext.sample_rate,
            size: ext.size,
            skip_count: ext.skip_count,
            skip_date: ext.skip_date,
            sort_album: ext.sort_album.clone(),
            sort_album_artist: ext.sort_album_artist.clone(),
            sort_artist: ext.sort_artist.clone(),
            sort_composer: ext.sort_composer.clone(),
            sort_genre: None,
            sort_name: ext.sort_name.clone(),
            total_time: ext.total_time,
            track_count: ext.track_count,
            track_number: ext.track_number,
            volume_adjustment: ext.volume_adjustment,
            work: ext.work.clone(),
            year: ext.year,
        };
        track.normalize_sort_fields();
        Ok(track)
    }

    /// Recompute every `sort_*` column from its source column.
    ///
    /// An explicit sort value from the library file takes precedence over the
    /// display value, but is normalized the same way.
    pub fn normalize_sort_fields(&mut self) {
        self.sort_album = sort_of(self.sort_album.as_ref(), self.album.as_ref(), make_sort);
        self.sort_album_artist = sort_of(
            self.sort_album_artist.as_ref(),
            self.album_artist.as_ref(),
            make_sort_artist,
        );
        self.sort_artist = sort_of(self.sort_artist.as_ref(), self.artist.as_ref(), make_sort_artist);
        self.sort_composer = sort_of(self.sort_composer.as_ref(), self.composer.as_ref(), make_sort);
        self.sort_genre = sort_of(None, self.genre.as_ref(), make_sort);
        self.sort_name = sort_of(self.sort_name.as_ref(), self.name.as_ref(), make_sort);
    }

    /// Merge an external change into this (local) row.
    ///
    /// `orig` is the external state at the previous sync and `cur` the
    /// external state now. Returns the names of the columns that changed.
    /// Any change stamps `date_modified` with `now`.
    pub fn update(&mut self, orig: &Self, cur: &Self, now: Timestamp) -> Vec<&'static str> {
        let changed = self.merge_columns(orig, cur);
        if !changed.is_empty() {
            self.date_modified = Some(now);
        }
        changed
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}
