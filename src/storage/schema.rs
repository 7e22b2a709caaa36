//! Database schema definitions.
//!
//! Persistent ids are stored as signed INTEGER and timestamps as INTEGER
//! milliseconds since the Unix epoch.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Library
-- ====================

CREATE TABLE IF NOT EXISTS track (
    id INTEGER PRIMARY KEY,
    album TEXT,
    album_artist TEXT,
    album_rating INTEGER,
    artist TEXT,
    bitrate INTEGER,
    bpm INTEGER,
    comments TEXT,
    compilation INTEGER,
    composer TEXT,
    date_added INTEGER,
    date_modified INTEGER,
    disc_count INTEGER,
    disc_number INTEGER,
    gapless INTEGER,
    genre TEXT,
    grouping TEXT,
    kind TEXT,
    location TEXT,
    loved INTEGER,
    media_kind INTEGER,
    movement_count INTEGER,
    movement_name TEXT,
    movement_number INTEGER,
    name TEXT,
    play_count INTEGER,
    play_date INTEGER,
    purchase_date INTEGER,
    purchased INTEGER,
    rating INTEGER,
    release_date INTEGER,
    sample_rate INTEGER,
    size INTEGER,
    skip_count INTEGER,
    skip_date INTEGER,
    sort_album TEXT,
    sort_album_artist TEXT,
    sort_artist TEXT,
    sort_composer TEXT,
    sort_genre TEXT,
    sort_name TEXT,
    total_time INTEGER,
    track_count INTEGER,
    track_number INTEGER,
    volume_adjustment INTEGER,
    work TEXT,
    year INTEGER
);

CREATE INDEX IF NOT EXISTS idx_track_sort_artist ON track(sort_artist, sort_album, disc_number, track_number);
CREATE INDEX IF NOT EXISTS idx_track_genre ON track(sort_genre);

CREATE TABLE IF NOT EXISTS playlist (
    id INTEGER PRIMARY KEY,
    parent_id INTEGER,
    kind INTEGER NOT NULL,
    folder INTEGER NOT NULL DEFAULT 0,
    name TEXT NOT NULL,
    date_added INTEGER,
    date_modified INTEGER,
    smart BLOB,
    genius_track_id INTEGER
);

CREATE INDEX IF NOT EXISTS idx_playlist_parent ON playlist(parent_id);

CREATE TABLE IF NOT EXISTS playlist_track (
    playlist_id INTEGER NOT NULL,
    track_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (playlist_id, position),
    FOREIGN KEY (playlist_id) REFERENCES playlist(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_playlist_track_track ON playlist_track(track_id);

-- ====================
-- Sync snapshots
-- ====================

-- Last external record seen per id and library owner, as serialized JSON.
CREATE TABLE IF NOT EXISTS itunes_track (
    id TEXT NOT NULL,
    data BLOB NOT NULL,
    mod_date INTEGER,
    owner_id INTEGER,
    PRIMARY KEY (id, owner_id)
);

CREATE TABLE IF NOT EXISTS itunes_playlist (
    id TEXT NOT NULL,
    data BLOB NOT NULL,
    mod_date INTEGER,
    owner_id INTEGER,
    PRIMARY KEY (id, owner_id)
);

-- ====================
-- Audit
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
";

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
