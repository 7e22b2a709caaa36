//! Stable 64-bit identifiers shared with the external library file.
//!
//! A `PersistentId` is rendered as 16 upper-case hex digits. SQLite has no
//! unsigned 64-bit integer, so the value is folded into an `i64` when stored:
//! the high bit is masked off and, if it was set, the remainder is negated.
//! `0x8000_0000_0000_0000` folds onto `0` and is the one value that does not
//! survive the round trip.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

const HIGH_BIT: u64 = 0x8000_0000_0000_0000;
const LOW_BITS: u64 = 0x7fff_ffff_ffff_ffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PersistentId(pub u64);

impl PersistentId {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Signed representation used for database columns.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn to_db(self) -> i64 {
        let iv = (self.0 & LOW_BITS) as i64;
        if self.0 > LOW_BITS { -iv } else { iv }
    }

    /// Inverse of [`PersistentId::to_db`].
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_db(v: i64) -> Self {
        if v < 0 {
            Self(v.unsigned_abs() | HIGH_BIT)
        } else {
            Self(v as u64)
        }
    }

    /// Generate a random id for locally created entities.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u64>())
    }
}

impl fmt::Display for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for PersistentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.len() > 16 {
            return Err(Error::InvalidPersistentId(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| Error::InvalidPersistentId(s.to_string()))
    }
}

impl From<u64> for PersistentId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl Serialize for PersistentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PersistentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for PersistentId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_db()))
    }
}

impl FromSql for PersistentId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(v) => Ok(Self::from_db(v)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
