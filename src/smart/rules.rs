//! Smart playlist rule tree.
//!
//! A [`Smart`] value is a [`RuleSet`] plus an optional [`SmartLimit`]. Rules
//! are a closed set of kinds; each kind carries its own typed values so the
//! decoder and the compiler match on them exhaustively.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{MediaKind, PersistentId, Timestamp};

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident($repr:ty) {
            $($(#[$vmeta:meta])* $variant:ident = $code:expr => $label:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            Other($repr),
        }

        impl $name {
            #[must_use]
            pub const fn code(self) -> $repr {
                match self {
                    $(Self::$variant => $code,)+
                    Self::Other(c) => c,
                }
            }

            #[must_use]
            pub const fn from_code(code: $repr) -> Self {
                match code {
                    $($code => Self::$variant,)+
                    c => Self::Other(c),
                }
            }

            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($label => Some(Self::$variant),)+
                    other => other
                        .strip_prefix("0x")
                        .and_then(|hex| <$repr>::from_str_radix(hex, 16).ok())
                        .map(Self::from_code),
                }
            }

            #[must_use]
            pub fn name(self) -> String {
                match self {
                    $(Self::$variant => $label.to_string(),)+
                    Self::Other(c) => format!("0x{c:02X}"),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.name())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.name())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_name(&s).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        s
                    ))
                })
            }
        }
    };
}

coded_enum! {
    /// Track attribute referenced by a rule, keyed by the library file's field id.
    Field(u32) {
        Ruleset = 0x00 => "ruleset",
        Name = 0x02 => "name",
        Album = 0x03 => "album",
        Artist = 0x04 => "artist",
        BitRate = 0x05 => "bitrate",
        SampleRate = 0x06 => "sample_rate",
        Year = 0x07 => "year",
        Genre = 0x08 => "genre",
        Kind = 0x09 => "kind",
        DateModified = 0x0A => "date_modified",
        TrackNumber = 0x0B => "track_number",
        Size = 0x0C => "size",
        TotalTime = 0x0D => "total_time",
        Comments = 0x0E => "comments",
        DateAdded = 0x10 => "date_added",
        Composer = 0x12 => "composer",
        PlayCount = 0x16 => "play_count",
        PlayDate = 0x17 => "play_date",
        DiscNumber = 0x18 => "disc_number",
        Rating = 0x19 => "rating",
        Disabled = 0x1D => "disabled",
        Compilation = 0x1F => "compilation",
        Bpm = 0x23 => "bpm",
        HasArtwork = 0x25 => "has_artwork",
        Grouping = 0x27 => "grouping",
        PlaylistPersistentId = 0x28 => "playlist_persistent_id",
        Purchased = 0x29 => "purchased",
        Description = 0x36 => "description",
        Category = 0x37 => "category",
        Podcast = 0x39 => "podcast",
        MediaKind = 0x3C => "media_kind",
        Series = 0x3E => "series",
        Season = 0x3F => "season",
        SkipCount = 0x44 => "skip_count",
        SkipDate = 0x45 => "skip_date",
        AlbumArtist = 0x47 => "album_artist",
        SortName = 0x4E => "sort_name",
        SortAlbum = 0x4F => "sort_album",
        SortAlbumArtist = 0x51 => "sort_album_artist",
        SortComposer = 0x52 => "sort_composer",
        SortSeries = 0x53 => "sort_series",
        VideoRating = 0x59 => "video_rating",
        AlbumRating = 0x5A => "album_rating",
        Location = 0x85 => "location",
        CloudStatus = 0x86 => "icloud_status",
        Loved = 0x9A => "loved",
    }
}

impl Field {
    /// Column holding this attribute, if the track table has one.
    #[must_use]
    pub const fn column(self) -> Option<&'static str> {
        Some(match self {
            Self::Name => "track.name",
            Self::Album => "track.album",
            Self::Artist => "track.artist",
            Self::BitRate => "track.bitrate",
            Self::SampleRate => "track.sample_rate",
            Self::Year => "track.year",
            Self::Genre => "track.genre",
            Self::Kind => "track.kind",
            Self::DateModified => "track.date_modified",
            Self::TrackNumber => "track.track_number",
            Self::Size => "track.size",
            Self::TotalTime => "track.total_time",
            Self::Comments => "track.comments",
            Self::DateAdded => "track.date_added",
            Self::Composer => "track.composer",
            Self::PlayCount => "track.play_count",
            Self::PlayDate => "track.play_date",
            Self::DiscNumber => "track.disc_number",
            Self::Rating => "track.rating",
            Self::Compilation => "track.compilation",
            Self::Bpm => "track.bpm",
            Self::Grouping => "track.grouping",
            Self::Purchased => "track.purchased",
            Self::MediaKind => "track.media_kind",
            Self::SkipCount => "track.skip_count",
            Self::SkipDate => "track.skip_date",
            Self::AlbumArtist => "track.album_artist",
            Self::SortName => "track.sort_name",
            Self::SortAlbum => "track.sort_album",
            Self::SortAlbumArtist => "track.sort_album_artist",
            Self::SortComposer => "track.sort_composer",
            Self::AlbumRating => "track.album_rating",
            Self::Loved => "track.loved",
            _ => return None,
        })
    }
}

coded_enum! {
    /// Comparison applied by a rule.
    #[derive(Default)]
    Operator(u16) {
        #[default]
        Is = 0x1 => "IS",
        Contains = 0x2 => "CONTAINS",
        StartsWith = 0x4 => "STARTSWITH",
        EndsWith = 0x8 => "ENDSWITH",
        GreaterThan = 0x10 => "GREATERTHAN",
        LessThan = 0x40 => "LESSTHAN",
        Between = 0x100 => "BETWEEN",
        Within = 0x200 => "WITHIN",
        Bitwise = 0x400 => "BITWISE",
    }
}

coded_enum! {
    /// Whether a rule is negated. The string variants exist because the
    /// library file uses a different sign code for text fields.
    #[derive(Default)]
    LogicSign(u8) {
        #[default]
        Pos = 0 => "POS",
        StrPos = 1 => "STRPOS",
        Neg = 2 => "NEG",
        StrNeg = 3 => "STRNEG",
    }
}

impl LogicSign {
    #[must_use]
    pub const fn is_negated(self) -> bool {
        matches!(self, Self::Neg | Self::StrNeg)
    }
}

coded_enum! {
    /// Ordering used when a limit selects which tracks to keep.
    LimitField(u32) {
        LowestRating = 0x01 => "lowest_rating",
        Random = 0x02 => "random",
        Name = 0x05 => "name",
        Album = 0x06 => "album",
        Artist = 0x07 => "artist",
        Genre = 0x09 => "genre",
        DateAdded = 0x15 => "date_added",
        PlayCount = 0x19 => "play_count",
        PlayDate = 0x1A => "play_date",
        Rating = 0x1C => "rating",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::And => 0,
            Self::Or => 1,
        }
    }

    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        if code == 1 { Self::Or } else { Self::And }
    }

    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Field, sign and operator shared by every leaf rule, plus its typed values.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition<V> {
    pub field: Field,
    pub sign: LogicSign,
    pub op: Operator,
    pub value: V,
}

impl<V> Condition<V> {
    #[must_use]
    pub fn new(field: Field, sign: LogicSign, op: Operator, value: V) -> Self {
        Self {
            field,
            sign,
            op,
            value,
        }
    }
}

/// A rule whose field type is not understood. Matches every track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownRule {
    pub field: Field,
    pub sign: LogicSign,
    pub op: Operator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Ruleset(RuleSet),
    String(Condition<Vec<String>>),
    Int(Condition<Vec<i64>>),
    Boolean(Condition<Option<bool>>),
    /// Absolute times, or for `WITHIN` a single relative offset in
    /// milliseconds (negative means "in the past").
    Date(Condition<Vec<Timestamp>>),
    MediaKind(Condition<Option<MediaKind>>),
    Playlist(Condition<Option<PersistentId>>),
    Unknown(UnknownRule),
}

impl Rule {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Ruleset(_) => "ruleset",
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
            Self::MediaKind(_) => "mediakind",
            Self::Playlist(_) => "playlist",
            Self::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub conjunction: Conjunction,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    #[must_use]
    pub fn new(conjunction: Conjunction, rules: Vec<Rule>) -> Self {
        Self { conjunction, rules }
    }

    /// True if any rule, at any depth, tests playlist membership.
    #[must_use]
    pub fn has_playlist_rule(&self) -> bool {
        self.rules.iter().any(|rule| match rule {
            Rule::Playlist(_) => true,
            Rule::Ruleset(nested) => nested.has_playlist_rule(),
            _ => false,
        })
    }
}

/// How much a limited smart playlist may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitCap {
    Items(u64),
    /// Total file size in bytes.
    Size(u64),
    /// Total duration in milliseconds.
    Time(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SmartLimitRepr", into = "SmartLimitRepr")]
pub struct SmartLimit {
    pub cap: LimitCap,
    pub field: LimitField,
    pub descending: bool,
}

impl SmartLimit {
    #[must_use]
    pub const fn max_items(&self) -> Option<u64> {
        match self.cap {
            LimitCap::Items(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn max_size(&self) -> Option<u64> {
        match self.cap {
            LimitCap::Size(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn max_time(&self) -> Option<u64> {
        match self.cap {
            LimitCap::Time(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SmartLimitRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<u64>,
    field: LimitField,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    desc: bool,
}

impl TryFrom<SmartLimitRepr> for SmartLimit {
    type Error = String;

    fn try_from(r: SmartLimitRepr) -> Result<Self, Self::Error> {
        let cap = match (r.items, r.size, r.time) {
            (Some(n), None, None) => LimitCap::Items(n),
            (None, Some(n), None) => LimitCap::Size(n),
            (None, None, Some(n)) => LimitCap::Time(n),
            _ => return Err("limit needs exactly one of items, size or time".to_string()),
        };
        Ok(Self {
            cap,
            field: r.field,
            descending: r.desc,
        })
    }
}

impl From<SmartLimit> for SmartLimitRepr {
    fn from(l: SmartLimit) -> Self {
        Self {
            items: l.max_items(),
            size: l.max_size(),
            time: l.max_time(),
            field: l.field,
            desc: l.descending,
        }
    }
}

/// A smart playlist definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Smart {
    pub ruleset: RuleSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<SmartLimit>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub live_updating: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub checked_only: bool,
}

/// Flat JSON shape of a rule.
#[derive(Default, Serialize, Deserialize)]
struct RuleRepr {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ruleset: Option<RuleSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field: Option<Field>,
    #[serde(default)]
    sign: LogicSign,
    #[serde(default)]
    op: Operator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    strings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ints: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    times: Vec<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bool: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    media_kind: Option<MediaKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    playlist: Option<PersistentId>,
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut repr = RuleRepr {
            kind: self.type_name().to_string(),
            ..RuleRepr::default()
        };
        match self {
            Self::Ruleset(rs) => repr.ruleset = Some(rs.clone()),
            Self::String(c) => {
                repr.fill(c.field, c.sign, c.op);
                repr.strings.clone_from(&c.value);
            }
            Self::Int(c) => {
                repr.fill(c.field, c.sign, c.op);
                repr.ints.clone_from(&c.value);
            }
            Self::Boolean(c) => {
                repr.fill(c.field, c.sign, c.op);
                repr.bool = c.value;
            }
            Self::Date(c) => {
                repr.fill(c.field, c.sign, c.op);
                repr.times.clone_from(&c.value);
            }
            Self::MediaKind(c) => {
                repr.fill(c.field, c.sign, c.op);
                repr.media_kind = c.value;
            }
            Self::Playlist(c) => {
                repr.fill(c.field, c.sign, c.op);
                repr.playlist = c.value;
            }
            Self::Unknown(u) => repr.fill(u.field, u.sign, u.op),
        }
        repr.serialize(serializer)
    }
}

impl RuleRepr {
    fn fill(&mut self, field: Field, sign: LogicSign, op: Operator) {
        self.field = Some(field);
        self.sign = sign;
        self.op = op;
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;

        let r = RuleRepr::deserialize(deserializer)?;
        let field = |default: Field| r.field.unwrap_or(default);
        let rule = match r.kind.as_str() {
            "ruleset" => Self::Ruleset(r.ruleset.clone().unwrap_or_default()),
            "string" => Self::String(Condition::new(
                field(Field::Name),
                r.sign,
                r.op,
                r.strings.clone(),
            )),
            "int" => Self::Int(Condition::new(field(Field::Rating), r.sign, r.op, r.ints.clone())),
            "boolean" => Self::Boolean(Condition::new(field(Field::Compilation), r.sign, r.op, r.bool)),
            "date" => Self::Date(Condition::new(
                field(Field::DateAdded),
                r.sign,
                r.op,
                r.times.clone(),
            )),
            "mediakind" => Self::MediaKind(Condition::new(
                field(Field::MediaKind),
                r.sign,
                r.op,
                r.media_kind,
            )),
            "playlist" => Self::Playlist(Condition::new(
                field(Field::PlaylistPersistentId),
                r.sign,
                r.op,
                r.playlist,
            )),
            "unknown" => Self::Unknown(UnknownRule {
                field: field(Field::Other(0)),
                sign: r.sign,
                op: r.op,
            }),
            other => return Err(D::Error::custom(format!("unknown rule type '{other}'"))),
        };
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_codes() {
        assert_eq!(Field::from_code(0x08), Field::Genre);
        assert_eq!(Field::Genre.code(), 0x08);
        assert_eq!(Field::from_code(0x77), Field::Other(0x77));
        assert_eq!(Field::from_name("genre"), Some(Field::Genre));
        assert_eq!(Field::from_name("0x77"), Some(Field::Other(0x77)));
        assert_eq!(Field::Other(0x77).name(), "0x77");
        assert_eq!(Field::Genre.column(), Some("track.genre"));
        assert_eq!(Field::Description.column(), None);
    }

    #[test]
    fn test_sign_negation() {
        assert!(!LogicSign::Pos.is_negated());
        assert!(!LogicSign::StrPos.is_negated());
        assert!(LogicSign::Neg.is_negated());
        assert!(LogicSign::StrNeg.is_negated());
        assert_eq!(LogicSign::default(), LogicSign::Pos);
        assert_eq!(Operator::default(), Operator::Is);
    }

    #[test]
    fn test_rule_json_shape() {
        let rule = Rule::String(Condition::new(
            Field::Genre,
            LogicSign::StrPos,
            Operator::Is,
            vec!["Rock".to_string()],
        ));
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["type"], "string");
        assert_eq!(value["field"], "genre");
        assert_eq!(value["sign"], "STRPOS");
        assert_eq!(value["op"], "IS");
        assert_eq!(value["strings"][0], "Rock");
        let back: Rule = serde_json::from_value(value).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_smart_json_shape() {
        let smart = Smart {
            ruleset: RuleSet::new(
                Conjunction::Or,
                vec![Rule::Playlist(Condition::new(
                    Field::PlaylistPersistentId,
                    LogicSign::Pos,
                    Operator::Is,
                    Some(PersistentId(0xAB)),
                ))],
            ),
            limit: Some(SmartLimit {
                cap: LimitCap::Items(25),
                field: LimitField::Rating,
                descending: true,
            }),
            live_updating: true,
            checked_only: false,
        };
        let value = serde_json::to_value(&smart).unwrap();
        assert_eq!(value["ruleset"]["conjunction"], "OR");
        assert_eq!(value["ruleset"]["rules"][0]["type"], "playlist");
        assert_eq!(value["ruleset"]["rules"][0]["playlist"], "00000000000000AB");
        assert_eq!(value["limit"]["items"], 25);
        assert_eq!(value["limit"]["field"], "rating");
        assert_eq!(value["limit"]["desc"], true);
        let back: Smart = serde_json::from_value(value).unwrap();
        assert_eq!(back, smart);
    }

    #[test]
    fn test_limit_requires_single_cap() {
        let bad = r#"{"items":1,"size":2,"field":"name"}"#;
        assert!(serde_json::from_str::<SmartLimit>(bad).is_err());
    }

    #[test]
    fn test_has_playlist_rule_nested() {
        let inner = RuleSet::new(
            Conjunction::And,
            vec![Rule::Playlist(Condition::new(
                Field::PlaylistPersistentId,
                LogicSign::Pos,
                Operator::Is,
                None,
            ))],
        );
        let outer = RuleSet::new(Conjunction::Or, vec![Rule::Ruleset(inner)]);
        assert!(outer.has_playlist_rule());
        assert!(!RuleSet::default().has_playlist_rule());
    }
}
