//! Media and playlist kind enumerations.
//!
//! Numeric codes match the external library file so values can be stored and
//! compared without translation.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Media kind bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaKind(pub u32);

impl MediaKind {
    pub const MUSIC: Self = Self(0x1);
    pub const MOVIE: Self = Self(0x2);
    pub const PODCAST: Self = Self(0x4);
    pub const AUDIOBOOK: Self = Self(0x8);
    pub const MUSIC_VIDEO: Self = Self(0x20);
    pub const TV_SHOW: Self = Self(0x40);
    pub const HOME_VIDEO: Self = Self(0x400);
    pub const VOICE_MEMO: Self = Self(0x10_0000);
    pub const BOOK: Self = Self(0x40_0000 | 0x80_0000);

    const NAMES: [(Self, &'static str); 9] = [
        (Self::MUSIC, "music"),
        (Self::MOVIE, "movie"),
        (Self::PODCAST, "podcast"),
        (Self::AUDIOBOOK, "audiobook"),
        (Self::MUSIC_VIDEO, "music_video"),
        (Self::TV_SHOW, "tv_show"),
        (Self::HOME_VIDEO, "home_video"),
        (Self::VOICE_MEMO, "voice_memo"),
        (Self::BOOK, "book"),
    ];

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, name)| *name)
    }

    /// Derive a media kind from the boolean flags of an external track.
    #[must_use]
    pub fn from_flags(movie: bool, podcast: bool, tv_show: bool, music_video: bool) -> Self {
        if movie {
            Self::MOVIE
        } else if podcast {
            Self::PODCAST
        } else if tv_show {
            Self::TV_SHOW
        } else if music_video {
            Self::MUSIC_VIDEO
        } else {
            Self::MUSIC
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:X}", self.0),
        }
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((kind, _)) = Self::NAMES.iter().find(|(_, name)| *name == s) {
            return Ok(*kind);
        }
        s.strip_prefix("0x")
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .or_else(|| s.parse().ok())
            .map(Self)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown media kind: {s}")))
    }
}

impl ToSql for MediaKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.0)))
    }
}

impl FromSql for MediaKind {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(|v| Self(v as u32))
    }
}

/// Playlist kind, ordered so that system lists sort before user lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaylistKind {
    Master,
    DownloadedMusic,
    DownloadedMovies,
    DownloadedTvShows,
    Movies,
    TvShows,
    Music,
    Audiobooks,
    Podcasts,
    PurchasedMusic,
    Folder,
    Purchased,
    Mix,
    Genius,
    Smart,
    Standard,
    /// A distinguished kind the library file reports that has no name here.
    Other(i64),
}

impl PlaylistKind {
    const NAMED: [Self; 16] = [
        Self::Master,
        Self::DownloadedMusic,
        Self::DownloadedMovies,
        Self::DownloadedTvShows,
        Self::Movies,
        Self::TvShows,
        Self::Music,
        Self::Audiobooks,
        Self::Podcasts,
        Self::PurchasedMusic,
        Self::Folder,
        Self::Purchased,
        Self::Mix,
        Self::Genius,
        Self::Smart,
        Self::Standard,
    ];

    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Master => -1,
            Self::DownloadedMusic => -65,
            Self::DownloadedMovies => -66,
            Self::DownloadedTvShows => -67,
            Self::Movies => 2,
            Self::TvShows => 3,
            Self::Music => 4,
            Self::Audiobooks => 5,
            Self::Podcasts => 10,
            Self::PurchasedMusic => 19,
            Self::Folder => 100,
            Self::Purchased => 101,
            Self::Mix => 102,
            Self::Genius => 103,
            Self::Smart => 104,
            Self::Standard => 199,
            Self::Other(n) => n,
        }
    }

    #[must_use]
    pub fn from_code(code: i64) -> Self {
        Self::NAMED
            .iter()
            .copied()
            .find(|k| k.code() == code)
            .unwrap_or(Self::Other(code))
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::DownloadedMusic => "downloaded_music",
            Self::DownloadedMovies => "downloaded_movies",
            Self::DownloadedTvShows => "downloaded_tvshows",
            Self::Movies => "movies",
            Self::TvShows => "tvshows",
            Self::Music => "music",
            Self::Audiobooks => "audiobooks",
            Self::Podcasts => "podcasts",
            Self::PurchasedMusic => "purchased_music",
            Self::Folder => "folder",
            Self::Purchased => "purchased",
            Self::Mix => "mix",
            Self::Genius => "genius",
            Self::Smart => "smart",
            Self::Standard => "standard",
            Self::Other(_) => "other",
        }
    }

    /// Kinds maintained by the library application itself rather than the user.
    #[must_use]
    pub const fn is_system(self) -> bool {
        self.code() < 100 || matches!(self, Self::Other(_))
    }
}

impl fmt::Display for PlaylistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(n) => write!(f, "other({n})"),
            k => f.write_str(k.as_str()),
        }
    }
}

impl Serialize for PlaylistKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Other(n) => serializer.serialize_i64(*n),
            k => serializer.serialize_str(k.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for PlaylistKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(i64),
            Name(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Code(n) => Ok(Self::from_code(n)),
            Repr::Name(s) => Self::NAMED
                .iter()
                .copied()
                .find(|k| k.as_str() == s)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown playlist kind: {s}"))),
        }
    }
}

impl ToSql for PlaylistKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for PlaylistKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self::from_code)
    }
}
