//! SQLite storage implementation.
//!
//! All writes go through [`SqliteStorage::mutate`], which wraps the work in
//! an IMMEDIATE transaction and writes the audit events it collected before
//! committing. The free functions at the bottom of this module operate on a
//! borrowed connection so the sync engine can combine several of them, and
//! the snapshot update, in one transaction.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, params_from_iter};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{PLAYLIST_COLUMNS, PersistentId, Playlist, TRACK_COLUMNS, Timestamp, Track};
use crate::smart::{CompileContext, Smart, compile_smart};
use crate::storage::events::{Event, EventType, insert_event};
use crate::storage::schema::apply_schema;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, collecting audit events.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(&self.op_name),
        );
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value)
                .with_comment(&self.op_name),
        );
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ================
    // Track Operations
    // ================

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_track(&self, id: PersistentId) -> Result<Option<Track>> {
        read_track(&self.conn, id)
    }

    /// Insert or replace a track row.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_track(&mut self, track: &Track, actor: &str) -> Result<()> {
        self.mutate("save_track", actor, |tx, ctx| {
            let existed = track_exists(tx, track.id)?;
            write_track(tx, track)?;
            let event = if existed {
                EventType::TrackUpdated
            } else {
                EventType::TrackCreated
            };
            ctx.record_event("track", &track.id.to_string(), event);
            Ok(())
        })
    }

    /// Delete a track and remove it from every playlist.
    ///
    /// # Errors
    ///
    /// Returns `TrackNotFound` if there is no such track.
    pub fn delete_track(&mut self, id: PersistentId, actor: &str) -> Result<()> {
        self.mutate("delete_track", actor, |tx, ctx| {
            remove_track(tx, id)?;
            ctx.record_event("track", &id.to_string(), EventType::TrackDeleted);
            Ok(())
        })
    }

    // ===================
    // Playlist Operations
    // ===================

    /// Load a playlist with its stored track ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_playlist(&self, id: PersistentId) -> Result<Option<Playlist>> {
        read_playlist(&self.conn, id)
    }

    /// Insert or replace a playlist and its track list.
    ///
    /// # Errors
    ///
    /// Returns a hierarchy error, without writing anything, if the parent
    /// chain loops, is broken, or passes through a non-folder.
    pub fn save_playlist(&mut self, playlist: &Playlist, actor: &str) -> Result<()> {
        self.mutate("save_playlist", actor, |tx, ctx| {
            let existed = read_playlist(tx, playlist.id)?.is_some();
            write_playlist(tx, playlist)?;
            let event = if existed {
                EventType::PlaylistUpdated
            } else {
                EventType::PlaylistCreated
            };
            ctx.record_event("playlist", &playlist.id.to_string(), event);
            Ok(())
        })
    }

    /// # Errors
    ///
    /// Returns `PlaylistNotFound` if there is no such playlist and
    /// `PlaylistFolderNotEmpty` if other playlists still live inside it.
    pub fn delete_playlist(&mut self, id: PersistentId, actor: &str) -> Result<()> {
        self.mutate("delete_playlist", actor, |tx, ctx| {
            remove_playlist(tx, id)?;
            ctx.record_event("playlist", &id.to_string(), EventType::PlaylistDeleted);
            Ok(())
        })
    }

    /// Stored track ids in playlist order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn playlist_track_ids(&self, id: PersistentId) -> Result<Vec<PersistentId>> {
        read_playlist_track_ids(&self.conn, id)
    }

    /// Tracks of a playlist in order. Smart playlists are evaluated against
    /// the library at `now`.
    ///
    /// # Errors
    ///
    /// Returns `PlaylistNotFound` if there is no such playlist.
    pub fn playlist_tracks(&self, id: PersistentId, now: Timestamp) -> Result<Vec<Track>> {
        let playlist = self
            .get_playlist(id)?
            .ok_or_else(|| Error::PlaylistNotFound { id: id.to_string() })?;
        if let Some(smart) = &playlist.smart {
            return self.smart_tracks(smart, &CompileContext::new(now));
        }

        let mut stmt = self.conn.prepare(
            "SELECT track.* FROM playlist_track, track
             WHERE playlist_track.playlist_id = ?1 AND playlist_track.track_id = track.id
             ORDER BY playlist_track.position",
        )?;
        let tracks = stmt
            .query_map([id], Track::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    /// Playlists directly inside `parent`, or top-level playlists for `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn child_playlists(&self, parent: Option<PersistentId>) -> Result<Vec<Playlist>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM playlist WHERE parent_id IS ?1 ORDER BY kind, name")?;
        let playlists = stmt
            .query_map([parent], Playlist::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(playlists)
    }

    /// Remove every occurrence of the given tracks from a playlist.
    /// Returns how many entries were removed.
    ///
    /// # Errors
    ///
    /// Returns `PlaylistNotFound` if there is no such playlist.
    pub fn delete_tracks_from_playlist(
        &mut self,
        id: PersistentId,
        track_ids: &[PersistentId],
        actor: &str,
    ) -> Result<usize> {
        let remove: HashSet<PersistentId> = track_ids.iter().copied().collect();
        self.mutate("delete_tracks_from_playlist", actor, |tx, ctx| {
            if read_playlist(tx, id)?.is_none() {
                return Err(Error::PlaylistNotFound { id: id.to_string() });
            }
            let before = read_playlist_track_ids(tx, id)?;
            let kept: Vec<PersistentId> =
                before.iter().copied().filter(|t| !remove.contains(t)).collect();
            let removed = before.len() - kept.len();
            if removed > 0 {
                write_playlist_tracks(tx, id, &kept)?;
                ctx.record_change(
                    "playlist",
                    &id.to_string(),
                    EventType::PlaylistTracksChanged,
                    Some(before.len().to_string()),
                    Some(kept.len().to_string()),
                );
            }
            Ok(removed)
        })
    }

    /// Evaluate a smart playlist against the library.
    ///
    /// Item caps are applied by the query. Size and duration caps are
    /// applied here, in result order, stopping before the first track that
    /// does not fit.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn smart_tracks(&self, smart: &Smart, ctx: &CompileContext) -> Result<Vec<Track>> {
        let query = compile_smart(smart, ctx);
        let sql = query.select_sql();
        debug!(sql = %sql, args = query.params().len(), "smart playlist query");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(query.params()))?;
        let mut budget = query.budget();
        let mut tracks = Vec::new();
        while let Some(row) = rows.next()? {
            let track = Track::from_row(row)?;
            if !budget.admit(track.size, track.total_time) {
                break;
            }
            tracks.push(track);
        }
        Ok(tracks)
    }

    /// Number of tracks and playlists in the library.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn counts(&self) -> Result<(usize, usize)> {
        let tracks: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM track", [], |row| row.get(0))?;
        let playlists: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM playlist", [], |row| row.get(0))?;
        Ok((tracks, playlists))
    }
}

// ==========================
// Connection-level operations
// ==========================

fn upsert_sql(table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len() + 1).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    format!(
        "INSERT INTO {table} (id, {}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

static TRACK_UPSERT: LazyLock<String> = LazyLock::new(|| {
    let columns: Vec<&str> = TRACK_COLUMNS.iter().map(|(c, _)| *c).collect();
    upsert_sql("track", &columns)
});

static PLAYLIST_UPSERT: LazyLock<String> =
    LazyLock::new(|| upsert_sql("playlist", PLAYLIST_COLUMNS));

fn track_exists(conn: &Connection, id: PersistentId) -> Result<bool> {
    Ok(conn
        .prepare_cached("SELECT 1 FROM track WHERE id = ?1")?
        .exists([id])?)
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn read_track(conn: &Connection, id: PersistentId) -> Result<Option<Track>> {
    Ok(conn
        .prepare_cached("SELECT * FROM track WHERE id = ?1")?
        .query_row([id], Track::from_row)
        .optional()?)
}

/// Insert the track, or overwrite every column of the existing row.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn write_track(conn: &Connection, track: &Track) -> Result<()> {
    conn.prepare_cached(&TRACK_UPSERT)?
        .execute(track.to_params().as_slice())?;
    Ok(())
}

/// # Errors
///
/// Returns `TrackNotFound` if there is no such track.
pub fn remove_track(conn: &Connection, id: PersistentId) -> Result<()> {
    conn.execute("DELETE FROM playlist_track WHERE track_id = ?1", [id])?;
    if conn.execute("DELETE FROM track WHERE id = ?1", [id])? == 0 {
        return Err(Error::TrackNotFound { id: id.to_string() });
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn read_playlist(conn: &Connection, id: PersistentId) -> Result<Option<Playlist>> {
    let playlist = conn
        .prepare_cached("SELECT * FROM playlist WHERE id = ?1")?
        .query_row([id], Playlist::from_row)
        .optional()?;
    let Some(mut playlist) = playlist else {
        return Ok(None);
    };
    playlist.track_ids = read_playlist_track_ids(conn, id)?;
    Ok(Some(playlist))
}

/// # Errors
///
/// Returns an error if the query fails.
pub fn read_playlist_track_ids(conn: &Connection, id: PersistentId) -> Result<Vec<PersistentId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT track_id FROM playlist_track WHERE playlist_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Walk the parent chain of `playlist` as it would be after saving it.
///
/// # Errors
///
/// Returns `CircularPlaylistFolder` if the chain revisits a playlist,
/// `NoSuchPlaylistFolder` if an ancestor is missing and `ParentNotAFolder`
/// if an ancestor is not a folder.
pub fn check_hierarchy(conn: &Connection, playlist: &Playlist) -> Result<()> {
    let id = playlist.id.to_string();
    let mut seen = HashSet::from([playlist.id]);
    let mut next = playlist.parent_id;
    while let Some(parent) = next {
        if !seen.insert(parent) {
            return Err(Error::CircularPlaylistFolder {
                id,
                parent: parent.to_string(),
            });
        }
        let row: Option<(bool, Option<PersistentId>)> = conn
            .prepare_cached("SELECT folder, parent_id FROM playlist WHERE id = ?1")?
            .query_row([parent], |r| Ok((r.get(0)?, r.get(1)?)))
            .optional()?;
        let Some((folder, grandparent)) = row else {
            return Err(Error::NoSuchPlaylistFolder {
                id,
                parent: parent.to_string(),
            });
        };
        if !folder {
            return Err(Error::ParentNotAFolder {
                id,
                parent: parent.to_string(),
            });
        }
        next = grandparent;
    }
    Ok(())
}

/// Check the hierarchy, then insert or overwrite the playlist row and
/// replace its stored track list.
///
/// # Errors
///
/// Returns a hierarchy error before anything is written, or a storage error.
pub fn write_playlist(conn: &Connection, playlist: &Playlist) -> Result<()> {
    check_hierarchy(conn, playlist)?;
    conn.prepare_cached(&PLAYLIST_UPSERT)?
        .execute(playlist.to_params().as_slice())?;
    let tracks: &[PersistentId] = if playlist.stores_tracks() {
        &playlist.track_ids
    } else {
        &[]
    };
    write_playlist_tracks(conn, playlist.id, tracks)
}

fn write_playlist_tracks(conn: &Connection, id: PersistentId, track_ids: &[PersistentId]) -> Result<()> {
    conn.execute("DELETE FROM playlist_track WHERE playlist_id = ?1", [id])?;
    let mut stmt = conn.prepare_cached(
        "INSERT INTO playlist_track (playlist_id, track_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, track_id) in track_ids.iter().enumerate() {
        stmt.execute(rusqlite::params![id, track_id, position])?;
    }
    Ok(())
}

/// # Errors
///
/// Returns `PlaylistFolderNotEmpty` while other playlists have this one as
/// parent, and `PlaylistNotFound` if there is no such playlist.
pub fn remove_playlist(conn: &Connection, id: PersistentId) -> Result<()> {
    let children: i64 = conn.query_row(
        "SELECT COUNT(*) FROM playlist WHERE parent_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    if children > 0 {
        return Err(Error::PlaylistFolderNotEmpty { id: id.to_string() });
    }
    conn.execute("DELETE FROM playlist_track WHERE playlist_id = ?1", [id])?;
    if conn.execute("DELETE FROM playlist WHERE id = ?1", [id])? == 0 {
        return Err(Error::PlaylistNotFound { id: id.to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaKind, PlaylistKind};
    use crate::smart::{
        Condition, Conjunction, Field, LimitCap, LimitField, LogicSign, Operator, Rule, RuleSet,
        SmartLimit,
    };
    use crate::storage::events::get_events;

    fn track(id: u64, name: &str, genre: &str) -> Track {
        Track {
            id: PersistentId(id),
            name: Some(name.to_string()),
            sort_name: Some(name.to_lowercase()),
            genre: Some(genre.to_string()),
            location: Some(format!("/music/{id}.mp3")),
            media_kind: Some(MediaKind::MUSIC),
            size: Some(100),
            total_time: Some(1000),
            ..Default::default()
        }
    }

    fn folder(id: u64, parent: Option<u64>) -> Playlist {
        let mut p = Playlist::new(PersistentId(id), format!("Folder {id}"), PlaylistKind::Folder);
        p.parent_id = parent.map(PersistentId);
        p
    }

    fn list(id: u64, parent: Option<u64>, tracks: &[u64]) -> Playlist {
        let mut p = Playlist::new(PersistentId(id), format!("List {id}"), PlaylistKind::Standard);
        p.parent_id = parent.map(PersistentId);
        p.track_ids = tracks.iter().copied().map(PersistentId).collect();
        p
    }

    fn genre_is(genre: &str) -> Smart {
        Smart {
            ruleset: RuleSet::new(
                Conjunction::And,
                vec![Rule::String(Condition::new(
                    Field::Genre,
                    LogicSign::StrPos,
                    Operator::Is,
                    vec![genre.to_string()],
                ))],
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        {
            let mut storage = SqliteStorage::open(&path).unwrap();
            storage.save_track(&track(1, "One", "Rock"), "test").unwrap();
        }
        let storage = SqliteStorage::open_with_timeout(&path, Some(100)).unwrap();
        assert!(storage.get_track(PersistentId(1)).unwrap().is_some());
    }

    #[test]
    fn test_track_crud() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut t = track(u64::MAX, "Song", "Rock");
        t.play_count = Some(3);
        storage.save_track(&t, "test").unwrap();
        assert_eq!(storage.get_track(t.id).unwrap(), Some(t.clone()));

        t.play_count = Some(4);
        storage.save_track(&t, "test").unwrap();
        assert_eq!(storage.get_track(t.id).unwrap().unwrap().play_count, Some(4));

        let events = get_events(storage.conn(), "track", &t.id.to_string(), None).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::TrackUpdated);

        storage.delete_track(t.id, "test").unwrap();
        assert_eq!(storage.get_track(t.id).unwrap(), None);
        assert!(matches!(
            storage.delete_track(t.id, "test"),
            Err(Error::TrackNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_track_removes_membership() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for i in 1..=3 {
            storage.save_track(&track(i, "t", "Rock"), "test").unwrap();
        }
        storage.save_playlist(&list(10, None, &[1, 2, 3, 2]), "test").unwrap();
        storage.delete_track(PersistentId(2), "test").unwrap();
        assert_eq!(
            storage.playlist_track_ids(PersistentId(10)).unwrap(),
            vec![PersistentId(1), PersistentId(3)]
        );
    }

    #[test]
    fn test_playlist_round_trip() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for i in 1..=3 {
            storage.save_track(&track(i, &format!("t{i}"), "Rock"), "test").unwrap();
        }
        storage.save_playlist(&folder(1, None), "test").unwrap();
        let p = list(10, Some(1), &[3, 1, 2]);
        storage.save_playlist(&p, "test").unwrap();

        let loaded = storage.get_playlist(p.id).unwrap().unwrap();
        assert_eq!(loaded, p);

        let tracks = storage.playlist_tracks(p.id, Timestamp(0)).unwrap();
        let names: Vec<_> = tracks.iter().map(|t| t.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["t3", "t1", "t2"]);

        let children = storage.child_playlists(Some(PersistentId(1))).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(storage.child_playlists(None).unwrap()[0].id, PersistentId(1));
    }

    #[test]
    fn test_smart_playlist_stores_no_tracks() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.save_track(&track(1, "a", "Rock"), "test").unwrap();
        storage.save_track(&track(2, "b", "Jazz"), "test").unwrap();

        let mut p = list(20, None, &[2]);
        p.kind = PlaylistKind::Smart;
        p.smart = Some(genre_is("Rock"));
        storage.save_playlist(&p, "test").unwrap();

        assert!(storage.playlist_track_ids(p.id).unwrap().is_empty());
        let loaded = storage.get_playlist(p.id).unwrap().unwrap();
        assert_eq!(loaded.smart, p.smart);
        let tracks = storage.playlist_tracks(p.id, Timestamp(0)).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, PersistentId(1));
    }

    #[test]
    fn test_hierarchy_violations_write_nothing() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.save_playlist(&folder(1, None), "test").unwrap();
        storage.save_playlist(&folder(2, Some(1)), "test").unwrap();
        storage.save_playlist(&list(3, None, &[]), "test").unwrap();

        let err = storage.save_playlist(&folder(1, Some(2)), "test").unwrap_err();
        assert!(matches!(err, Error::CircularPlaylistFolder { .. }));
        assert_eq!(storage.get_playlist(PersistentId(1)).unwrap().unwrap().parent_id, None);

        let err = storage.save_playlist(&folder(1, Some(1)), "test").unwrap_err();
        assert!(matches!(err, Error::CircularPlaylistFolder { .. }));

        let err = storage.save_playlist(&list(4, Some(3), &[]), "test").unwrap_err();
        assert!(matches!(err, Error::ParentNotAFolder { .. }));
        assert!(storage.get_playlist(PersistentId(4)).unwrap().is_none());

        let err = storage.save_playlist(&list(5, Some(99), &[]), "test").unwrap_err();
        assert!(matches!(err, Error::NoSuchPlaylistFolder { .. }));
    }

    #[test]
    fn test_delete_playlist_refused_while_children_exist() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.save_playlist(&folder(1, None), "test").unwrap();
        storage.save_playlist(&list(2, Some(1), &[]), "test").unwrap();

        let err = storage.delete_playlist(PersistentId(1), "test").unwrap_err();
        assert!(matches!(err, Error::PlaylistFolderNotEmpty { .. }));
        assert!(storage.get_playlist(PersistentId(1)).unwrap().is_some());

        storage.delete_playlist(PersistentId(2), "test").unwrap();
        storage.delete_playlist(PersistentId(1), "test").unwrap();
        assert!(matches!(
            storage.delete_playlist(PersistentId(1), "test"),
            Err(Error::PlaylistNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_tracks_from_playlist() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.save_playlist(&list(1, None, &[1, 2, 3, 2, 4]), "test").unwrap();
        let removed = storage
            .delete_tracks_from_playlist(PersistentId(1), &[PersistentId(2), PersistentId(9)], "test")
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            storage.playlist_track_ids(PersistentId(1)).unwrap(),
            vec![PersistentId(1), PersistentId(3), PersistentId(4)]
        );
        let none = storage
            .delete_tracks_from_playlist(PersistentId(1), &[PersistentId(9)], "test")
            .unwrap();
        assert_eq!(none, 0);
    }

    #[test]
    fn test_smart_tracks_size_budget() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for (i, size) in [(1, 40), (2, 50), (3, 20), (4, 5)] {
            let mut t = track(i, &format!("t{i}"), "Rock");
            t.size = Some(size);
            storage.save_track(&t, "test").unwrap();
        }
        let mut smart = genre_is("Rock");
        smart.limit = Some(SmartLimit {
            cap: LimitCap::Size(100),
            field: LimitField::Name,
            descending: false,
        });
        let ctx = CompileContext::with_modulus(Timestamp(0), 3);
        let ids: Vec<u64> = storage
            .smart_tracks(&smart, &ctx)
            .unwrap()
            .iter()
            .map(|t| t.id.0)
            .collect();
        // 40 + 50 fits, adding 20 would exceed 100.
        assert_eq!(ids, vec![1, 2]);

        smart.limit = Some(SmartLimit {
            cap: LimitCap::Items(3),
            field: LimitField::Name,
            descending: true,
        });
        let ids: Vec<u64> = storage
            .smart_tracks(&smart, &ctx)
            .unwrap()
            .iter()
            .map(|t| t.id.0)
            .collect();
        assert_eq!(ids, vec![4, 3, 2]);
    }

    #[test]
    fn test_smart_tracks_skip_tracks_without_file() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.save_track(&track(1, "a", "Rock"), "test").unwrap();
        let mut cloud = track(2, "b", "Rock");
        cloud.location = None;
        storage.save_track(&cloud, "test").unwrap();
        let ctx = CompileContext::with_modulus(Timestamp(0), 3);
        assert_eq!(storage.smart_tracks(&genre_is("Rock"), &ctx).unwrap().len(), 1);
    }
}
