//! Last externally observed state per entity.
//!
//! Snapshots are only used to tell whether an incoming external record
//! differs from the one seen at the previous sync. They live in the same
//! database as the rows they describe so both are written in one
//! transaction.

use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::model::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Track,
    Playlist,
}

impl SnapshotKind {
    const fn table(self) -> &'static str {
        match self {
            Self::Track => "itunes_track",
            Self::Playlist => "itunes_playlist",
        }
    }
}

/// Deterministic bytes for an external record.
///
/// Struct fields serialize in declaration order and unset fields are
/// omitted, so equal records always give equal bytes.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized.
pub fn snapshot_bytes<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Decode a stored snapshot back into the record it was made from.
///
/// # Errors
///
/// Returns an error if the bytes are not a serialized `T`.
pub fn decode_snapshot<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Snapshot table for one entity kind, scoped to one library owner.
///
/// Borrowing a `Transaction` works too, since it derefs to `Connection`.
pub struct SnapshotStore<'c> {
    conn: &'c Connection,
    kind: SnapshotKind,
    owner_id: Option<i64>,
}

impl<'c> SnapshotStore<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection, kind: SnapshotKind, owner_id: Option<i64>) -> Self {
        Self {
            conn,
            kind,
            owner_id,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, external_id: &str) -> Result<Option<Vec<u8>>> {
        let sql = format!(
            "SELECT data FROM {} WHERE id = ?1 AND owner_id IS ?2",
            self.kind.table()
        );
        Ok(self
            .conn
            .query_row(&sql, rusqlite::params![external_id, self.owner_id], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Insert or overwrite this owner's snapshot for `external_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put(&self, external_id: &str, blob: &[u8], mod_date: Option<Timestamp>) -> Result<()> {
        // A NULL owner never conflicts in the key, so upsert by hand.
        let params = rusqlite::params![external_id, blob, mod_date, self.owner_id];
        let update = format!(
            "UPDATE {} SET data = ?2, mod_date = ?3 WHERE id = ?1 AND owner_id IS ?4",
            self.kind.table()
        );
        if self.conn.execute(&update, params)? == 0 {
            let insert = format!(
                "INSERT INTO {} (id, data, mod_date, owner_id) VALUES (?1, ?2, ?3, ?4)",
                self.kind.table()
            );
            self.conn.execute(&insert, params)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, external_id: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE id = ?1 AND owner_id IS ?2",
            self.kind.table()
        );
        self.conn
            .execute(&sql, rusqlite::params![external_id, self.owner_id])?;
        Ok(())
    }

    /// Every id with a snapshot for this owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_known_ids(&self) -> Result<HashSet<String>> {
        let sql = format!(
            "SELECT id FROM {} WHERE owner_id IS ?1",
            self.kind.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map([self.owner_id], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExternalTrack, PersistentId};
    use crate::storage::schema::apply_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_put_get_delete() {
        let conn = conn();
        let store = SnapshotStore::new(&conn, SnapshotKind::Track, Some(1));
        assert_eq!(store.get("A").unwrap(), None);

        store.put("A", b"one", Some(Timestamp(5))).unwrap();
        store.put("A", b"two", None).unwrap();
        assert_eq!(store.get("A").unwrap().as_deref(), Some(&b"two"[..]));

        store.delete("A").unwrap();
        assert_eq!(store.get("A").unwrap(), None);
    }

    #[test]
    fn test_known_ids_are_per_owner_and_kind() {
        let conn = conn();
        let mine = SnapshotStore::new(&conn, SnapshotKind::Track, Some(1));
        let theirs = SnapshotStore::new(&conn, SnapshotKind::Track, Some(2));
        let playlists = SnapshotStore::new(&conn, SnapshotKind::Playlist, Some(1));
        mine.put("A", b"x", None).unwrap();
        mine.put("B", b"x", None).unwrap();
        theirs.put("C", b"x", None).unwrap();
        playlists.put("P", b"x", None).unwrap();

        let ids = mine.list_known_ids().unwrap();
        assert_eq!(ids, HashSet::from(["A".to_string(), "B".to_string()]));
        assert_eq!(theirs.list_known_ids().unwrap().len(), 1);

        let unowned = SnapshotStore::new(&conn, SnapshotKind::Playlist, None);
        unowned.put("Q", b"x", None).unwrap();
        assert_eq!(unowned.list_known_ids().unwrap(), HashSet::from(["Q".to_string()]));
    }

    #[test]
    fn test_owners_do_not_share_snapshots() {
        let conn = conn();
        let first = SnapshotStore::new(&conn, SnapshotKind::Track, Some(1));
        let second = SnapshotStore::new(&conn, SnapshotKind::Track, Some(2));
        let unowned = SnapshotStore::new(&conn, SnapshotKind::Track, None);

        first.put("X", b"one", None).unwrap();
        assert_eq!(second.get("X").unwrap(), None);
        assert_eq!(unowned.get("X").unwrap(), None);

        second.put("X", b"two", None).unwrap();
        unowned.put("X", b"none", None).unwrap();
        unowned.put("X", b"none again", None).unwrap();
        assert_eq!(first.get("X").unwrap().as_deref(), Some(&b"one"[..]));
        assert_eq!(second.get("X").unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(unowned.get("X").unwrap().as_deref(), Some(&b"none again"[..]));
        assert_eq!(unowned.list_known_ids().unwrap().len(), 1);

        second.delete("X").unwrap();
        assert_eq!(second.get("X").unwrap(), None);
        assert!(first.list_known_ids().unwrap().contains("X"));
        assert!(unowned.list_known_ids().unwrap().contains("X"));
    }

    #[test]
    fn test_snapshot_bytes_are_deterministic() {
        let track = ExternalTrack {
            track_id: Some(42),
            persistent_id: Some(PersistentId(0xAB)),
            name: Some("Song".into()),
            play_count: Some(3),
            ..Default::default()
        };
        let mut renumbered = track.clone();
        renumbered.track_id = Some(7);
        assert_eq!(snapshot_bytes(&track).unwrap(), snapshot_bytes(&renumbered).unwrap());

        let back: ExternalTrack = decode_snapshot(&snapshot_bytes(&track).unwrap()).unwrap();
        assert_eq!(back.play_count, Some(3));
        assert_eq!(back.track_id, None);
    }
}
