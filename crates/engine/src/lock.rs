//! Per-entity mutual exclusion for version recording.
//!
//! Recording for one entity identity is serialized so that two mutations can
//! never claim the same version number. Different entities never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rewind_storage::EntityKey;

use crate::error::RewindError;

/// Held for the duration of one recording; releases on drop.
pub struct LockGuard {
    _held: Box<dyn Send>,
}

impl LockGuard {
    pub fn new(held: impl Send + 'static) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LockGuard")
    }
}

/// Source of per-entity locks. Implement over a distributed lock service to
/// serialize recording across processes.
#[async_trait]
pub trait LockProvider: Send + Sync + 'static {
    /// Wait at most `wait` for the lock on `key`.
    ///
    /// Returns `Err(RewindError::LockTimeout)` when the bound elapses.
    async fn acquire(&self, key: &EntityKey, wait: Duration) -> Result<LockGuard, RewindError>;
}

/// In-process locks: one async mutex per entity key.
#[derive(Debug, Default)]
pub struct LocalLocks {
    slots: Mutex<HashMap<EntityKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocalLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &EntityKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Drop slots nobody else holds so the map does not grow without bound.
        slots.retain(|k, slot| k == key || Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(key.clone()).or_default())
    }
}

#[async_trait]
impl LockProvider for LocalLocks {
    async fn acquire(&self, key: &EntityKey, wait: Duration) -> Result<LockGuard, RewindError> {
        let slot = self.slot(key);
        match tokio::time::timeout(wait, slot.lock_owned()).await {
            Ok(guard) => Ok(LockGuard::new(guard)),
            Err(_elapsed) => Err(RewindError::LockTimeout {
                entity_type: key.entity_type.clone(),
                entity_id: key.entity_id.clone(),
                waited_ms: wait.as_millis() as u64,
            }),
        }
    }
}
