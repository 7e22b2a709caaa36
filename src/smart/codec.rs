//! Binary codec for smart playlist definitions.
//!
//! The library file stores a smart playlist as two base64 records: a fixed
//! info record with the limit settings, and a criteria record holding a
//! ruleset header followed by one header and payload per rule. All integers
//! are big-endian.
//!
//! Decoding never panics on short input. A rule whose payload cannot be
//! understood becomes [`Rule::Unknown`]; only a missing info record or
//! ruleset header is a hard error.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{MediaKind, PersistentId, Timestamp};
use crate::smart::rules::{
    Condition, Conjunction, Field, LimitCap, LimitField, LogicSign, Operator, Rule, RuleSet,
    Smart, SmartLimit, UnknownRule,
};

const INFO_LEN: usize = 112;
const INFO_MIN_LEN: usize = 14;
const RULESET_HEADER_LEN: usize = 136;
const RULESET_HEADER_MIN_LEN: usize = 16;
const RULE_HEADER_LEN: usize = 56;
const INT_DATA_LEN: usize = 68;

const RULESET_MAGIC: [u8; 8] = [83, 76, 115, 116, 0, 1, 0, 1];
const RELATIVE_MARKER: [u8; 4] = [45, 174, 45, 174];
const RELATIVE_BASE: u32 = 766_389_678;

/// Date values count seconds from 1904-01-01.
const DATE_EPOCH_OFFSET: i64 = -2_082_844_800;

const LOVE_LOVED: u32 = 2;
const LOVE_DISLIKED: u32 = 3;

const MEGABYTE: u64 = 1024 * 1024;
const GIGABYTE: u64 = 1024 * MEGABYTE;
const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

const DAY: i64 = 86_400;
const RELATIVE_UNITS: [i64; 6] = [365 * DAY, 30 * DAY, 7 * DAY, DAY, 3600, 60];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },

    #[error("unknown field type for field 0x{0:02X}")]
    UnknownFieldType(u32),
}

/// Unit of the limit size in the info record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitUnit {
    Minutes,
    Megabytes,
    Items,
    Hours,
    Gigabytes,
}

impl LimitUnit {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Minutes => 1,
            Self::Megabytes => 2,
            Self::Items => 3,
            Self::Hours => 4,
            Self::Gigabytes => 5,
        }
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Minutes,
            2 => Self::Megabytes,
            3 => Self::Items,
            4 => Self::Hours,
            5 => Self::Gigabytes,
            _ => return None,
        })
    }

    fn cap(self, size: u32) -> LimitCap {
        let size = u64::from(size);
        match self {
            Self::Items => LimitCap::Items(size),
            Self::Megabytes => LimitCap::Size(size * MEGABYTE),
            Self::Gigabytes => LimitCap::Size(size * GIGABYTE),
            Self::Minutes => LimitCap::Time(size * MINUTE_MS),
            Self::Hours => LimitCap::Time(size * HOUR_MS),
        }
    }

    fn from_cap(cap: LimitCap) -> (Self, u64) {
        match cap {
            LimitCap::Items(n) => (Self::Items, n),
            LimitCap::Size(b) if b > 0 && b % GIGABYTE == 0 => (Self::Gigabytes, b / GIGABYTE),
            LimitCap::Size(b) => (Self::Megabytes, b / MEGABYTE),
            LimitCap::Time(ms) if ms > 0 && ms % HOUR_MS == 0 => (Self::Hours, ms / HOUR_MS),
            LimitCap::Time(ms) => (Self::Minutes, ms / MINUTE_MS),
        }
    }
}

/// Contents of the info record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmartInfo {
    pub live_updating: bool,
    pub checked_only: bool,
    pub limit: Option<SmartLimit>,
}

/// Declared payload type of a rule field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Ruleset,
    String,
    Int,
    Boolean,
    Date,
    MediaKind,
    Playlist,
    Love,
    Cloud,
    Location,
    Unknown,
}

impl FieldType {
    fn of(field: Field) -> Self {
        match field {
            Field::Ruleset => Self::Ruleset,
            Field::Album
            | Field::AlbumArtist
            | Field::Artist
            | Field::Category
            | Field::Comments
            | Field::Composer
            | Field::Description
            | Field::Genre
            | Field::Grouping
            | Field::Kind
            | Field::Name
            | Field::Series
            | Field::SortAlbum
            | Field::SortAlbumArtist
            | Field::SortComposer
            | Field::SortName
            | Field::SortSeries
            | Field::VideoRating => Self::String,
            Field::Bpm
            | Field::BitRate
            | Field::DiscNumber
            | Field::PlayCount
            | Field::Rating
            | Field::Podcast
            | Field::SampleRate
            | Field::Season
            | Field::Size
            | Field::SkipCount
            | Field::TotalTime
            | Field::TrackNumber
            | Field::Year
            | Field::AlbumRating => Self::Int,
            Field::Compilation | Field::HasArtwork | Field::Purchased | Field::Disabled => {
                Self::Boolean
            }
            Field::DateAdded | Field::DateModified | Field::PlayDate | Field::SkipDate => Self::Date,
            Field::MediaKind => Self::MediaKind,
            Field::PlaylistPersistentId => Self::Playlist,
            Field::Loved => Self::Love,
            Field::CloudStatus => Self::Cloud,
            Field::Location => Self::Location,
            Field::Other(_) => Self::Unknown,
        }
    }
}

fn read_u16(b: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([b[at], b[at + 1]])
}

fn read_u32(b: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&b[at..at + 4]);
    u32::from_be_bytes(buf)
}

fn read_u64(b: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&b[at..at + 8]);
    u64::from_be_bytes(buf)
}

fn clamp_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn require(b: &[u8], need: usize, what: &'static str) -> Result<(), DecodeError> {
    if b.len() < need {
        return Err(DecodeError::Truncated {
            what,
            need,
            have: b.len(),
        });
    }
    Ok(())
}

/// The three-integer payload shared by int, date, boolean and enum rules.
#[derive(Debug, Clone, Copy, Default)]
struct IntData {
    junk1: [u8; 4],
    int_a: u32,
    rel_a: i64,
    bool_b: u32,
    junk3: [u8; 4],
    int_b: u32,
    bool_c: u32,
    int_c: u32,
}

impl IntData {
    fn parse(b: &[u8]) -> Result<Self, DecodeError> {
        require(b, INT_DATA_LEN, "integer payload")?;
        let mut junk1 = [0u8; 4];
        junk1.copy_from_slice(&b[0..4]);
        let mut junk3 = [0u8; 4];
        junk3.copy_from_slice(&b[24..28]);
        #[allow(clippy::cast_possible_wrap)]
        let rel_a = read_u64(b, 8) as i64;
        Ok(Self {
            junk1,
            int_a: read_u32(b, 4),
            rel_a,
            bool_b: read_u32(b, 20),
            junk3,
            int_b: read_u32(b, 28),
            bool_c: read_u32(b, 44),
            int_c: read_u32(b, 52),
        })
    }

    fn single(value: u32) -> Self {
        Self {
            int_a: value,
            ..Self::default()
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_values(values: &[i64]) -> Self {
        let at = |i: usize| values.get(i).map_or(0, |v| *v as u32);
        Self {
            int_a: at(0),
            bool_b: u32::from(values.len() > 1),
            int_b: at(1),
            bool_c: u32::from(values.len() > 2),
            int_c: at(2),
            ..Self::default()
        }
    }

    /// First value, then the second if flagged, then the third if both are.
    fn ints(&self) -> Vec<i64> {
        let mut out = vec![i64::from(self.int_a)];
        if self.bool_b > 0 {
            out.push(i64::from(self.int_b));
            if self.bool_c > 0 {
                out.push(i64::from(self.int_c));
            }
        }
        out
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; INT_DATA_LEN];
        out[0..4].copy_from_slice(&self.junk1);
        out[4..8].copy_from_slice(&self.int_a.to_be_bytes());
        out[8..16].copy_from_slice(&self.rel_a.to_be_bytes());
        out[20..24].copy_from_slice(&self.bool_b.to_be_bytes());
        out[24..28].copy_from_slice(&self.junk3);
        out[28..32].copy_from_slice(&self.int_b.to_be_bytes());
        out[44..48].copy_from_slice(&self.bool_c.to_be_bytes());
        out[52..56].copy_from_slice(&self.int_c.to_be_bytes());
        out
    }
}

fn decode_utf16be(b: &[u8]) -> String {
    let units = b.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]]));
    let mut s: String = char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if b.len() % 2 == 1 {
        s.push(char::REPLACEMENT_CHARACTER);
    }
    s
}

fn encode_utf16be(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

fn decode_base64(text: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

/// Decode the base64 info and criteria records of a smart playlist.
pub fn decode_smart(info: &str, criteria: &str) -> Result<Smart, DecodeError> {
    decode_smart_bytes(&decode_base64(info)?, &decode_base64(criteria)?)
}

pub fn decode_smart_bytes(info: &[u8], criteria: &[u8]) -> Result<Smart, DecodeError> {
    let info = decode_info(info)?;
    let ruleset = decode_criteria(criteria)?;
    Ok(Smart {
        ruleset,
        limit: info.limit,
        live_updating: info.live_updating,
        checked_only: info.checked_only,
    })
}

/// Decode the info record. Only the first 14 bytes carry data.
pub fn decode_info(b: &[u8]) -> Result<SmartInfo, DecodeError> {
    require(b, INFO_MIN_LEN, "info record")?;
    let has_limit = b[2] != 0;
    let descending = b[13] == 0;
    let limit = if has_limit {
        let unit = LimitUnit::from_code(b[3]);
        if unit.is_none() {
            debug!(unit = b[3], "unrecognized limit unit, ignoring limit");
        }
        unit.map(|unit| SmartLimit {
            cap: unit.cap(read_u32(b, 8)),
            field: LimitField::from_code(read_u32(b, 4)),
            descending,
        })
    } else {
        None
    };
    Ok(SmartInfo {
        live_updating: b[0] != 0,
        checked_only: b[12] != 0,
        limit,
    })
}

/// Decode a criteria record into a rule set.
pub fn decode_criteria(b: &[u8]) -> Result<RuleSet, DecodeError> {
    require(b, RULESET_HEADER_MIN_LEN, "ruleset header")?;
    let count = read_u32(b, 8);
    let conjunction = Conjunction::from_code(read_u32(b, 12));
    if count == 0 {
        return Ok(RuleSet::new(conjunction, Vec::new()));
    }
    require(b, RULESET_HEADER_LEN, "ruleset header")?;

    let mut rules = Vec::new();
    let mut pos = RULESET_HEADER_LEN;
    for index in 0..count {
        let Some(header) = b.get(pos..pos + RULE_HEADER_LEN) else {
            warn!(index, count, "criteria ends inside a rule header");
            break;
        };
        let field = Field::from_code(read_u32(header, 0));
        let sign = LogicSign::from_code(header[4]);
        let op = Operator::from_code(read_u16(header, 6));
        let len = read_u32(header, 52) as usize;
        pos += RULE_HEADER_LEN;

        let end = pos.saturating_add(len);
        let Some(payload) = b.get(pos..end) else {
            warn!(index, %field, len, "criteria ends inside a rule payload");
            rules.push(Rule::Unknown(UnknownRule { field, sign, op }));
            break;
        };
        pos = end;
        rules.push(decode_rule(field, sign, op, payload));
    }
    Ok(RuleSet::new(conjunction, rules))
}

fn decode_rule(field: Field, sign: LogicSign, op: Operator, payload: &[u8]) -> Rule {
    match try_decode_rule(field, sign, op, payload) {
        Ok(rule) => rule,
        Err(e) => {
            warn!(%field, error = %e, "rule cannot be decoded, treating as always true");
            Rule::Unknown(UnknownRule { field, sign, op })
        }
    }
}

fn try_decode_rule(field: Field, sign: LogicSign, op: Operator, payload: &[u8]) -> Result<Rule, DecodeError> {
    let rule = match FieldType::of(field) {
        FieldType::Ruleset => Rule::Ruleset(decode_criteria(payload)?),
        FieldType::String => {
            let values = if payload.is_empty() {
                Vec::new()
            } else {
                vec![decode_utf16be(payload)]
            };
            Rule::String(Condition::new(field, sign, op, values))
        }
        FieldType::Int => {
            let values = if payload.is_empty() {
                Vec::new()
            } else {
                IntData::parse(payload)?.ints()
            };
            Rule::Int(Condition::new(field, sign, op, values))
        }
        FieldType::Boolean => {
            let value = match payload.len() {
                0 => None,
                n if n >= INT_DATA_LEN => Some(IntData::parse(payload)?.int_a != 0),
                _ => Some(true),
            };
            Rule::Boolean(Condition::new(field, sign, op, value))
        }
        FieldType::Date => Rule::Date(Condition::new(field, sign, op, decode_dates(op, payload)?)),
        FieldType::MediaKind => {
            let value = if payload.is_empty() {
                None
            } else {
                Some(MediaKind(IntData::parse(payload)?.int_a))
            };
            Rule::MediaKind(Condition::new(field, sign, op, value))
        }
        FieldType::Playlist => {
            let value = if payload.is_empty() {
                None
            } else {
                require(payload, 8, "playlist payload")?;
                Some(PersistentId(read_u64(payload, 0)))
            };
            Rule::Playlist(Condition::new(field, sign, op, value))
        }
        FieldType::Love => {
            let value = if payload.is_empty() {
                None
            } else {
                match IntData::parse(payload)?.int_a {
                    LOVE_LOVED => Some(true),
                    LOVE_DISLIKED => Some(false),
                    _ => None,
                }
            };
            Rule::Boolean(Condition::new(Field::Loved, sign, op, value))
        }
        FieldType::Cloud | FieldType::Location => {
            debug!(%field, "status rule kept opaque");
            Rule::Unknown(UnknownRule { field, sign, op })
        }
        FieldType::Unknown => return Err(DecodeError::UnknownFieldType(field.code())),
    };
    Ok(rule)
}

fn decode_dates(op: Operator, payload: &[u8]) -> Result<Vec<Timestamp>, DecodeError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    let data = IntData::parse(payload)?;
    if op == Operator::Within {
        let ms = data
            .rel_a
            .saturating_mul(i64::from(data.bool_b))
            .saturating_mul(1000);
        return Ok(vec![Timestamp(ms)]);
    }
    let mut ints = data.ints();
    if ints.last() == Some(&0) {
        ints.pop();
    }
    Ok(ints
        .into_iter()
        .map(|v| Timestamp::from_unix_seconds(v + DATE_EPOCH_OFFSET))
        .collect())
}

/// Encode a smart playlist as base64 `(info, criteria)`.
#[must_use]
pub fn encode_smart(smart: &Smart) -> (String, String) {
    let (info, criteria) = encode_smart_bytes(smart);
    (STANDARD.encode(info), STANDARD.encode(criteria))
}

#[must_use]
pub fn encode_smart_bytes(smart: &Smart) -> (Vec<u8>, Vec<u8>) {
    (encode_info(smart), encode_criteria(&smart.ruleset))
}

#[must_use]
pub fn encode_info(smart: &Smart) -> Vec<u8> {
    let mut out = vec![0u8; INFO_LEN];
    out[0] = u8::from(smart.live_updating);
    out[1] = 1;
    out[12] = u8::from(smart.checked_only);
    match smart.limit {
        Some(limit) => {
            let (unit, size) = LimitUnit::from_cap(limit.cap);
            out[2] = 1;
            out[3] = unit.code();
            out[4..8].copy_from_slice(&limit.field.code().to_be_bytes());
            out[8..12].copy_from_slice(&clamp_u32(size).to_be_bytes());
            out[13] = u8::from(!limit.descending);
        }
        None => out[13] = 1,
    }
    out
}

/// Encode a rule set. Unknown rules are skipped and the count reflects
/// only the rules written.
#[must_use]
pub fn encode_criteria(ruleset: &RuleSet) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = ruleset.rules.iter().filter_map(encode_rule).collect();
    let mut out = vec![0u8; RULESET_HEADER_LEN];
    out[0..8].copy_from_slice(&RULESET_MAGIC);
    out[8..12].copy_from_slice(&clamp_u32(encoded.len() as u64).to_be_bytes());
    out[12..16].copy_from_slice(&ruleset.conjunction.code().to_be_bytes());
    for rule in encoded {
        out.extend_from_slice(&rule);
    }
    out
}

fn rule_header(field: Field, sign: LogicSign, op: Operator, nested: bool, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; RULE_HEADER_LEN];
    out[0..4].copy_from_slice(&field.code().to_be_bytes());
    out[4] = sign.code();
    out[6..8].copy_from_slice(&op.code().to_be_bytes());
    if nested {
        out[8] = 1;
    }
    out[52..56].copy_from_slice(&clamp_u32(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn encode_rule(rule: &Rule) -> Option<Vec<u8>> {
    let (field, sign, op, payload) = match rule {
        Rule::Ruleset(nested) => {
            let payload = encode_criteria(nested);
            return Some(rule_header(Field::Ruleset, LogicSign::Pos, Operator::Is, true, &payload));
        }
        Rule::String(c) => (
            c.field,
            c.sign,
            c.op,
            c.value.first().map(|s| encode_utf16be(s)).unwrap_or_default(),
        ),
        Rule::Int(c) => {
            let payload = if c.value.is_empty() {
                Vec::new()
            } else {
                IntData::from_values(&c.value).encode()
            };
            (c.field, c.sign, c.op, payload)
        }
        Rule::Boolean(c) if c.field == Field::Loved => {
            let payload = c
                .value
                .map(|loved| IntData::single(if loved { LOVE_LOVED } else { LOVE_DISLIKED }).encode())
                .unwrap_or_default();
            (c.field, c.sign, c.op, payload)
        }
        Rule::Boolean(c) => {
            let payload = c
                .value
                .map(|b| IntData::single(u32::from(b)).encode())
                .unwrap_or_default();
            (c.field, c.sign, c.op, payload)
        }
        Rule::Date(c) => (c.field, c.sign, c.op, encode_dates(c.op, &c.value)),
        Rule::MediaKind(c) => (
            c.field,
            c.sign,
            c.op,
            c.value
                .map(|k| IntData::single(k.bits()).encode())
                .unwrap_or_default(),
        ),
        Rule::Playlist(c) => (
            c.field,
            c.sign,
            c.op,
            c.value.map(|p| p.value().to_be_bytes().to_vec()).unwrap_or_default(),
        ),
        Rule::Unknown(u) => {
            debug!(field = %u.field, "skipping opaque rule");
            return None;
        }
    };
    Some(rule_header(field, sign, op, false, &payload))
}

fn encode_dates(op: Operator, values: &[Timestamp]) -> Vec<u8> {
    let Some(first) = values.first() else {
        return Vec::new();
    };
    if op == Operator::Within {
        let rel = first.millis() / 1000;
        let unit = RELATIVE_UNITS
            .iter()
            .copied()
            .find(|unit| rel % unit == 0)
            .unwrap_or(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let data = IntData {
            junk1: RELATIVE_MARKER,
            int_a: RELATIVE_BASE,
            rel_a: rel / unit,
            bool_b: unit as u32,
            junk3: RELATIVE_MARKER,
            int_b: RELATIVE_BASE,
            ..IntData::default()
        };
        return data.encode();
    }
    let secs: Vec<i64> = values
        .iter()
        .map(|t| t.unix_seconds() - DATE_EPOCH_OFFSET)
        .collect();
    IntData::from_values(&secs).encode()
}

/// Storage form: `[u32 len][info][u32 len][criteria]`.
#[must_use]
pub fn to_blob(smart: &Smart) -> Vec<u8> {
    let (info, criteria) = encode_smart_bytes(smart);
    let mut out = Vec::with_capacity(8 + info.len() + criteria.len());
    for part in [&info, &criteria] {
        out.extend_from_slice(&clamp_u32(part.len() as u64).to_be_bytes());
        out.extend_from_slice(part);
    }
    out
}

pub fn from_blob(b: &[u8]) -> Result<Smart, DecodeError> {
    let mut parts = Vec::with_capacity(2);
    let mut pos = 0usize;
    for what in ["smart info length", "smart criteria length"] {
        let rest = &b[pos..];
        require(rest, 4, what)?;
        let len = read_u32(rest, 0) as usize;
        let body = rest.get(4..4 + len).ok_or(DecodeError::Truncated {
            what,
            need: 4 + len,
            have: rest.len(),
        })?;
        parts.push(body);
        pos += 4 + len;
    }
    decode_smart_bytes(parts[0], parts[1])
}

impl ToSql for Smart {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(to_blob(self)))
    }
}

impl FromSql for Smart {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Blob(b) => from_blob(b).map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Text(t) => serde_json::from_slice(t).map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
