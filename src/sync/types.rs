//! Sync result types.

use serde::Serialize;

/// What happened to one external record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// First sighting; the row was created.
    Created,
    /// The row was merged with the external change.
    Updated {
        /// The playlist moved to a different folder.
        parent_changed: bool,
        /// Track order diverged on both sides; incoming order was kept.
        conflict: bool,
    },
    /// The snapshot matched, or the change merged to nothing.
    Unchanged,
    /// The record was not applied.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingPersistentId,
    /// Disabled, or no file location.
    NotImportable,
    SystemPlaylist,
    /// Row deleted locally since the last sync; it stays deleted.
    DeletedLocally,
    /// Folder-ness or smart-ness differs between local and external.
    ShapeChanged,
    /// The parent chain would loop or pass through a non-folder.
    HierarchyRejected,
}

/// Per-entity counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    /// Removed at the end of a completed stream.
    pub deleted: usize,
    pub conflicts: usize,
}

impl EntityStats {
    pub fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated { conflict, .. } => {
                self.updated += 1;
                if conflict {
                    self.conflicts += 1;
                }
            }
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// Records seen in the stream.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged + self.skipped
    }
}

/// Statistics for one sync stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub tracks: EntityStats,
    pub playlists: EntityStats,
    /// The stream ended early; nothing was pruned.
    pub aborted: bool,
}

impl SyncStats {
    #[must_use]
    pub fn total_processed(&self) -> usize {
        self.tracks.total() + self.playlists.total()
    }

    #[must_use]
    pub fn total_changed(&self) -> usize {
        self.tracks.created
            + self.tracks.updated
            + self.tracks.deleted
            + self.playlists.created
            + self.playlists.updated
            + self.playlists.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_stats() {
        let mut stats = EntityStats::default();
        stats.record(SyncOutcome::Created);
        stats.record(SyncOutcome::Updated {
            parent_changed: false,
            conflict: true,
        });
        stats.record(SyncOutcome::Unchanged);
        stats.record(SyncOutcome::Skipped(SkipReason::SystemPlaylist));
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.conflicts, 1);
    }

    #[test]
    fn test_sync_stats_totals() {
        let mut stats = SyncStats::default();
        stats.tracks.record(SyncOutcome::Created);
        stats.playlists.record(SyncOutcome::Unchanged);
        stats.playlists.deleted = 2;
        assert_eq!(stats.total_processed(), 2);
        assert_eq!(stats.total_changed(), 3);
    }
}
