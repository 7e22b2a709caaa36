//! Sync engine.
//!
//! Mirrors one library stream into SQLite. Per record:
//!
//! 1. No snapshot: the entity is new. Insert the row and the snapshot.
//! 2. Snapshot byte-equal to the incoming record: nothing to do.
//! 3. Snapshot differs: load the local row (gone means deleted locally, and
//!    it stays deleted), decode the snapshot as `orig`, merge the
//!    `orig → incoming` change into the local row, then write the row and
//!    the new snapshot.
//!
//! Every step runs in one transaction, so a row and its snapshot never
//! disagree. Change events are emitted only after commit.
//!
//! The engine holds no entity state between records; each step re-reads the
//! local row.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    Clock, ExternalPlaylist, ExternalRecord, ExternalTrack, PersistentId, Playlist, Track,
};
use crate::storage::events::EventType;
use crate::storage::snapshot::{decode_snapshot, snapshot_bytes};
use crate::storage::sqlite::{
    read_playlist, read_track, remove_playlist, remove_track, write_playlist, write_track,
};
use crate::storage::{SnapshotKind, SnapshotStore, SqliteStorage};
use crate::sync::notify::{ChangeEvent, ChangeSink, ChangeType, EntityKind};
use crate::sync::types::{SkipReason, SyncOutcome, SyncStats};

const TRACK_PROGRESS_INTERVAL: usize = 1000;
const PLAYLIST_PROGRESS_INTERVAL: usize = 100;

/// Hierarchy violations reject one playlist; the stream goes on.
const fn is_hierarchy_error(e: &Error) -> bool {
    matches!(
        e,
        Error::CircularPlaylistFolder { .. }
            | Error::NoSuchPlaylistFolder { .. }
            | Error::ParentNotAFolder { .. }
    )
}

pub struct SyncEngine<'a> {
    storage: &'a mut SqliteStorage,
    config: &'a Config,
    clock: &'a dyn Clock,
    sink: &'a dyn ChangeSink,
}

impl<'a> SyncEngine<'a> {
    #[must_use]
    pub fn new(
        storage: &'a mut SqliteStorage,
        config: &'a Config,
        clock: &'a dyn Clock,
        sink: &'a dyn ChangeSink,
    ) -> Self {
        Self {
            storage,
            config,
            clock,
            sink,
        }
    }

    /// Sync a whole stream, then prune entities the stream no longer has.
    ///
    /// A record that fails to read aborts the stream: everything committed
    /// so far stays committed, nothing is pruned, and the returned stats have
    /// `aborted` set.
    ///
    /// # Errors
    ///
    /// Returns a storage error. Records committed before it stay committed.
    pub fn sync_stream<I>(&mut self, records: I) -> Result<SyncStats>
    where
        I: IntoIterator<Item = Result<ExternalRecord>>,
    {
        let mut stats = SyncStats::default();
        let mut seen_tracks = HashSet::new();
        let mut seen_playlists = HashSet::new();

        for record in records {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "library stream aborted");
                    stats.aborted = true;
                    break;
                }
            };

            match record {
                ExternalRecord::Track(ext) => {
                    if let Some(id) = ext.persistent_id {
                        seen_tracks.insert(id.to_string());
                    }
                    let outcome = self.sync_track(&ext)?;
                    stats.tracks.record(outcome);
                    let n = stats.tracks.total();
                    if n % TRACK_PROGRESS_INTERVAL == 0 {
                        info!(tracks = n, "sync progress");
                    }
                }
                ExternalRecord::Playlist(ext) => {
                    if let Some(id) = ext.persistent_id {
                        seen_playlists.insert(id.to_string());
                    }
                    let outcome = match self.sync_playlist(&ext) {
                        Ok(outcome) => outcome,
                        Err(e) if is_hierarchy_error(&e) => {
                            warn!(error = %e, "playlist rejected");
                            SyncOutcome::Skipped(SkipReason::HierarchyRejected)
                        }
                        Err(e) => return Err(e),
                    };
                    stats.playlists.record(outcome);
                    let n = stats.playlists.total();
                    if n % PLAYLIST_PROGRESS_INTERVAL == 0 {
                        info!(playlists = n, "sync progress");
                    }
                }
            }
        }

        if !stats.aborted {
            stats.tracks.deleted = self.prune_tracks(&seen_tracks)?;
            stats.playlists.deleted = self.prune_playlists(&seen_playlists)?;
        }

        info!(
            tracks_created = stats.tracks.created,
            tracks_updated = stats.tracks.updated,
            tracks_deleted = stats.tracks.deleted,
            playlists_created = stats.playlists.created,
            playlists_updated = stats.playlists.updated,
            playlists_deleted = stats.playlists.deleted,
            conflicts = stats.playlists.conflicts,
            aborted = stats.aborted,
            "sync finished"
        );
        Ok(stats)
    }

    /// Sync one external track.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or a decode error for a corrupt snapshot.
    pub fn sync_track(&mut self, ext: &ExternalTrack) -> Result<SyncOutcome> {
        let Some(id) = ext.persistent_id else {
            warn!(track_id = ?ext.track_id, "track without persistent id skipped");
            return Ok(SyncOutcome::Skipped(SkipReason::MissingPersistentId));
        };
        if !ext.is_importable() {
            debug!(track = %id, "track not importable");
            return Ok(SyncOutcome::Skipped(SkipReason::NotImportable));
        }

        let key = id.to_string();
        let blob = snapshot_bytes(ext)?;
        let owner_id = self.config.owner_id;
        let now = self.clock.now();

        let outcome = self
            .storage
            .mutate("sync_track", &self.config.actor, |tx, ctx| {
                let snapshots = SnapshotStore::new(tx, SnapshotKind::Track, owner_id);
                let Some(previous) = snapshots.get(&key)? else {
                    let track = Track::from_external(ext)?;
                    write_track(tx, &track)?;
                    snapshots.put(&key, &blob, ext.date_modified)?;
                    ctx.record_event("track", &key, EventType::TrackCreated);
                    return Ok(SyncOutcome::Created);
                };
                if previous == blob {
                    return Ok(SyncOutcome::Unchanged);
                }
                let Some(mut local) = read_track(tx, id)? else {
                    return Ok(SyncOutcome::Skipped(SkipReason::DeletedLocally));
                };

                let orig = Track::from_external(&decode_snapshot::<ExternalTrack>(&previous)?)?;
                let cur = Track::from_external(ext)?;
                let changed = local.update(&orig, &cur, now);
                if !changed.is_empty() {
                    write_track(tx, &local)?;
                    ctx.record_change(
                        "track",
                        &key,
                        EventType::TrackUpdated,
                        None,
                        Some(changed.join(",")),
                    );
                }
                snapshots.put(&key, &blob, ext.date_modified)?;
                Ok(if changed.is_empty() {
                    SyncOutcome::Unchanged
                } else {
                    SyncOutcome::Updated {
                        parent_changed: false,
                        conflict: false,
                    }
                })
            })?;

        debug!(track = %id, ?outcome, "track synced");
        self.notify(EntityKind::Track, id, outcome);
        Ok(outcome)
    }

    /// Sync one external playlist.
    ///
    /// # Errors
    ///
    /// Returns a hierarchy error if the playlist would sit in a cycle, under
    /// a missing folder or under a non-folder; nothing is written in that
    /// case. Otherwise returns storage and decode errors.
    pub fn sync_playlist(&mut self, ext: &ExternalPlaylist) -> Result<SyncOutcome> {
        let Some(id) = ext.persistent_id else {
            warn!(playlist_id = ?ext.playlist_id, "playlist without persistent id skipped");
            return Ok(SyncOutcome::Skipped(SkipReason::MissingPersistentId));
        };
        if self.config.skip_system_playlists && ext.is_system() {
            debug!(playlist = %id, "system playlist skipped");
            return Ok(SyncOutcome::Skipped(SkipReason::SystemPlaylist));
        }

        let key = id.to_string();
        let blob = snapshot_bytes(ext)?;
        let owner_id = self.config.owner_id;
        let now = self.clock.now();

        let outcome = self
            .storage
            .mutate("sync_playlist", &self.config.actor, |tx, ctx| {
                let snapshots = SnapshotStore::new(tx, SnapshotKind::Playlist, owner_id);
                let Some(previous) = snapshots.get(&key)? else {
                    let playlist = Playlist::from_external(ext)?;
                    write_playlist(tx, &playlist)?;
                    snapshots.put(&key, &blob, ext.date_modified)?;
                    ctx.record_event("playlist", &key, EventType::PlaylistCreated);
                    return Ok(SyncOutcome::Created);
                };
                if previous == blob {
                    return Ok(SyncOutcome::Unchanged);
                }
                let Some(mut local) = read_playlist(tx, id)? else {
                    return Ok(SyncOutcome::Skipped(SkipReason::DeletedLocally));
                };

                let orig =
                    Playlist::from_external(&decode_snapshot::<ExternalPlaylist>(&previous)?)?;
                let cur = Playlist::from_external(ext)?;
                let old_parent = local.parent_id;
                let update = local.update(&orig, &cur, now);
                if update.refused {
                    warn!(playlist = %id, name = %local.name, "playlist changed shape, keeping local row");
                    return Ok(SyncOutcome::Skipped(SkipReason::ShapeChanged));
                }
                if update.changed {
                    write_playlist(tx, &local)?;
                    if update.parent_changed {
                        ctx.record_change(
                            "playlist",
                            &key,
                            EventType::PlaylistMoved,
                            old_parent.map(|p| p.to_string()),
                            local.parent_id.map(|p| p.to_string()),
                        );
                    }
                    ctx.record_event("playlist", &key, EventType::PlaylistUpdated);
                }
                snapshots.put(&key, &blob, ext.date_modified)?;
                Ok(if update.changed {
                    SyncOutcome::Updated {
                        parent_changed: update.parent_changed,
                        conflict: update.conflict,
                    }
                } else {
                    SyncOutcome::Unchanged
                })
            })?;

        debug!(playlist = %id, ?outcome, "playlist synced");
        self.notify(EntityKind::Playlist, id, outcome);
        Ok(outcome)
    }

    fn notify(&self, kind: EntityKind, id: PersistentId, outcome: SyncOutcome) {
        let change = match outcome {
            SyncOutcome::Created => ChangeType::Created,
            SyncOutcome::Updated { .. } => ChangeType::Changed,
            SyncOutcome::Unchanged | SyncOutcome::Skipped(_) => return,
        };
        self.sink.emit(ChangeEvent::new(kind, id, change));
    }

    fn stale_ids(&self, kind: SnapshotKind, seen: &HashSet<String>) -> Result<Vec<String>> {
        let known =
            SnapshotStore::new(self.storage.conn(), kind, self.config.owner_id).list_known_ids()?;
        let mut stale: Vec<String> = known.difference(seen).cloned().collect();
        stale.sort();
        Ok(stale)
    }

    /// Remove tracks whose snapshots the completed stream did not mention.
    fn prune_tracks(&mut self, seen: &HashSet<String>) -> Result<usize> {
        let owner_id = self.config.owner_id;
        let mut deleted = 0;
        for key in self.stale_ids(SnapshotKind::Track, seen)? {
            let removed = self
                .storage
                .mutate("prune_track", &self.config.actor, |tx, ctx| {
                    SnapshotStore::new(tx, SnapshotKind::Track, owner_id).delete(&key)?;
                    let Ok(id) = key.parse::<PersistentId>() else {
                        return Ok(None);
                    };
                    match remove_track(tx, id) {
                        Ok(()) => {
                            ctx.record_event("track", &key, EventType::TrackDeleted);
                            Ok(Some(id))
                        }
                        Err(Error::TrackNotFound { .. }) => Ok(None),
                        Err(e) => Err(e),
                    }
                })?;
            if let Some(id) = removed {
                debug!(track = %id, "track pruned");
                self.sink
                    .emit(ChangeEvent::new(EntityKind::Track, id, ChangeType::Deleted));
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Remove playlists the completed stream did not mention. Folders go
    /// after their children; a folder that keeps children is left in place.
    fn prune_playlists(&mut self, seen: &HashSet<String>) -> Result<usize> {
        let owner_id = self.config.owner_id;
        let mut deleted = 0;
        let mut pending = self.stale_ids(SnapshotKind::Playlist, seen)?;

        loop {
            let mut blocked = Vec::new();
            let before = pending.len();
            for key in pending {
                let result = self
                    .storage
                    .mutate("prune_playlist", &self.config.actor, |tx, ctx| {
                        let id = key.parse::<PersistentId>().ok();
                        let removed = match id.map(|id| remove_playlist(tx, id)) {
                            Some(Ok(())) => {
                                ctx.record_event("playlist", &key, EventType::PlaylistDeleted);
                                id
                            }
                            Some(Err(Error::PlaylistNotFound { .. })) | None => None,
                            Some(Err(e)) => return Err(e),
                        };
                        SnapshotStore::new(tx, SnapshotKind::Playlist, owner_id).delete(&key)?;
                        Ok(removed)
                    });
                match result {
                    Ok(Some(id)) => {
                        debug!(playlist = %id, "playlist pruned");
                        self.sink.emit(ChangeEvent::new(
                            EntityKind::Playlist,
                            id,
                            ChangeType::Deleted,
                        ));
                        deleted += 1;
                    }
                    Ok(None) => {}
                    Err(Error::PlaylistFolderNotEmpty { .. }) => blocked.push(key),
                    Err(e) => return Err(e),
                }
            }

            if blocked.is_empty() || blocked.len() == before {
                for key in &blocked {
                    info!(playlist = %key, "folder still has children, not pruned");
                }
                break;
            }
            pending = blocked;
        }
        Ok(deleted)
    }
}
