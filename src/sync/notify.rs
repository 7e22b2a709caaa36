//! Change notifications.
//!
//! The engine emits one [`ChangeEvent`] per committed write. Emission never
//! blocks and never fails the sync: a full or closed channel drops the event.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use serde::Serialize;
use tracing::debug;

use crate::model::PersistentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Track,
    Playlist,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Playlist => "playlist",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub id: PersistentId,
    pub change: ChangeType,
}

impl ChangeEvent {
    #[must_use]
    pub const fn new(kind: EntityKind, id: PersistentId, change: ChangeType) -> Self {
        Self { kind, id, change }
    }
}

/// Receiver of change notifications.
pub trait ChangeSink {
    fn emit(&self, event: ChangeEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn emit(&self, _event: ChangeEvent) {}
}

/// Forwards events over a bounded channel, dropping them when it is full.
#[derive(Debug)]
pub struct ChannelSink {
    tx: SyncSender<ChangeEvent>,
    dropped: AtomicUsize,
}

impl ChannelSink {
    /// A sink and the receiving end of its channel.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<ChangeEvent>) {
        let (tx, rx) = sync_channel(capacity);
        (
            Self {
                tx,
                dropped: AtomicUsize::new(0),
            },
            rx,
        )
    }

    /// Events discarded because the channel was full or closed.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ChangeSink for ChannelSink {
    fn emit(&self, event: ChangeEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event) | TrySendError::Disconnected(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %event.kind, id = %event.id, "change event dropped");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ChangeSink for RecordingSink {
    fn emit(&self, event: ChangeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
