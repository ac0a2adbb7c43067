//! Notifications for external observers.

use rewind_storage::EntityKey;
use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered events per subscriber before lagging receivers start losing them.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionEvent {
    /// A version record was inserted.
    Created {
        key: EntityKey,
        version: u64,
        is_snapshot: bool,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<VersionEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<VersionEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers. Having none is fine.
    pub(crate) fn publish(&self, event: VersionEvent) {
        let _ = self.sender.send(event);
    }
}
