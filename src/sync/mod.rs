//! Library sync.
//!
//! Mirrors an external library stream into the local database:
//!
//! - **Engine**: per-record create / merge / skip, then end-of-stream pruning
//! - **Merge**: three-way merge of playlist track order
//! - **Notify**: change events emitted after each commit
//! - **File**: JSONL reader for library streams
//!
//! # Example
//!
//! ```ignore
//! use tunesync::sync::{read_records, NullSink, SyncEngine};
//!
//! let mut engine = SyncEngine::new(&mut storage, &config, &SystemClock, &NullSink);
//! let stats = engine.sync_stream(read_records(path)?)?;
//! ```

pub mod engine;
pub mod file;
pub mod merge;
pub mod notify;
pub mod types;

pub use engine::SyncEngine;
pub use file::{read_records, RecordReader};
pub use merge::three_way_merge;
pub use notify::{ChangeEvent, ChangeSink, ChangeType, ChannelSink, EntityKind, NullSink, RecordingSink};
pub use types::{EntityStats, SkipReason, SyncOutcome, SyncStats};
