//! SQLite storage layer.
//!
//! - WAL mode for concurrent reads
//! - One IMMEDIATE transaction per write, with audit events
//! - Snapshot tables for change detection during sync
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`migrations`] - Numbered schema upgrades
//! - [`schema`] - Database schema definitions
//! - [`snapshot`] - Last externally observed record per entity
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod migrations;
pub mod schema;
pub mod snapshot;
pub mod sqlite;

pub use snapshot::{SnapshotKind, SnapshotStore};
pub use sqlite::{MutationContext, SqliteStorage};
