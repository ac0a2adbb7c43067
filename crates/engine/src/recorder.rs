//! Version recording.
//!
//! Turns one entity mutation into at most one version record. Recording is
//! serialized per entity through a [`LockProvider`] so version numbers are
//! never reused, and is advisory: a lock timeout skips the record instead of
//! failing the mutation that has already been persisted.

use std::sync::Arc;

use rewind_storage::{AttributeMap, EntityKey, VersionRecord, VersionStore};
use serde_json::Value;
use tracing::{debug, warn};

use crate::actor::ActorResolver;
use crate::config::RewindConfig;
use crate::entity::{AttributePolicy, Entity};
use crate::error::RewindError;
use crate::events::{EventBus, VersionEvent};
use crate::history::History;
use crate::lock::{LockGuard, LockProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Mutation,
    Removal,
    Restore,
}

pub struct VersionRecorder {
    store: Arc<dyn VersionStore>,
    config: Arc<RewindConfig>,
    locks: Arc<dyn LockProvider>,
    actor: Arc<dyn ActorResolver>,
    events: EventBus,
}

impl VersionRecorder {
    pub(crate) fn new(
        store: Arc<dyn VersionStore>,
        config: Arc<RewindConfig>,
        locks: Arc<dyn LockProvider>,
        actor: Arc<dyn ActorResolver>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            config,
            locks,
            actor,
            events,
        }
    }

    /// Record the in-flight mutation of `entity`.
    ///
    /// Returns the inserted record, or `None` when there was nothing to record
    /// or the per-entity lock could not be acquired in time. When the entity
    /// has a version pointer it is moved to the new version and persisted with
    /// recording suppressed.
    pub async fn record<E>(&self, entity: &mut E) -> Result<Option<VersionRecord>, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.capture(entity, Capture::Mutation).await
    }

    /// Record a soft removal. Every tracked attribute is written, as for a
    /// creation, whether or not it changed.
    pub async fn record_removal<E>(
        &self,
        entity: &mut E,
    ) -> Result<Option<VersionRecord>, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.capture(entity, Capture::Removal).await
    }

    /// Record a restore as a new forward version.
    ///
    /// Always written as a snapshot whose old values are the former head, as
    /// the pointer no longer says which version the previous state was.
    pub async fn record_restore<E>(
        &self,
        entity: &mut E,
    ) -> Result<Option<VersionRecord>, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.capture(entity, Capture::Restore).await
    }

    async fn capture<E>(
        &self,
        entity: &mut E,
        kind: Capture,
    ) -> Result<Option<VersionRecord>, RewindError>
    where
        E: Entity + ?Sized,
    {
        let policy = AttributePolicy::resolve(entity, &self.config)?;
        let key = entity.entity_key();

        let Some(_lock) = self.lock(&key).await? else {
            return Ok(None);
        };

        let created = entity.was_created();
        let removed = kind == Capture::Removal || !entity.exists();
        let changed = entity.changed_attributes();
        if !created && !removed && !changed.iter().any(|name| policy.is_tracked(name)) {
            debug!(entity = %key, "no tracked change, nothing to record");
            return Ok(None);
        }

        let next = self.store.max_version(&key).await? + 1;
        let pointer = entity
            .version_pointer()
            .filter(|_| entity.has_version_pointer());
        let branching = kind == Capture::Restore
            || matches!(pointer, Some(p) if p != 0 && p != next - 1);

        let attributes = entity.attributes();
        let current = policy.only_tracked(&attributes);

        // A write from a rewound position: old values describe the former head.
        let head = if branching {
            let history = History::load(self.store.as_ref(), &key).await?;
            Some(policy.only_tracked(&history.rebuild_head(&policy)))
        } else {
            None
        };

        let mut old_values = head.clone().unwrap_or_default();
        let mut new_values = AttributeMap::new();
        for (name, value) in &current {
            if !(created || removed || branching || changed.contains(name)) {
                continue;
            }
            let old = head
                .as_ref()
                .and_then(|h| h.get(name).cloned())
                .or_else(|| entity.original_value(name))
                .unwrap_or(Value::Null);
            old_values.insert(name.clone(), old);
            new_values.insert(name.clone(), value.clone());
        }

        if old_values.is_empty() && new_values.is_empty() {
            debug!(entity = %key, "empty diff, nothing to record");
            return Ok(None);
        }

        let is_snapshot = branching || next == 1 || next % self.config.snapshot_interval == 0;
        if is_snapshot {
            new_values = current;
        }

        let record = VersionRecord {
            entity_type: key.entity_type.clone(),
            entity_id: key.entity_id.clone(),
            version: next,
            old_values,
            new_values,
            is_snapshot,
            actor_id: self.actor_id(),
            created_at: now_rfc3339(),
        };
        self.store.insert(record.clone()).await?;
        debug!(entity = %key, version = next, is_snapshot, branching, "recorded version");

        self.move_pointer(entity, next).await?;
        self.publish(&record);
        Ok(Some(record))
    }

    /// Record a first snapshot for an entity that has no history yet.
    ///
    /// For entities that existed before they were tracked. No-op when any
    /// version exists.
    pub async fn init_version<E>(
        &self,
        entity: &mut E,
    ) -> Result<Option<VersionRecord>, RewindError>
    where
        E: Entity + ?Sized,
    {
        let policy = AttributePolicy::resolve(entity, &self.config)?;
        let key = entity.entity_key();

        let Some(_lock) = self.lock(&key).await? else {
            return Ok(None);
        };
        if self.store.max_version(&key).await? > 0 {
            return Ok(None);
        }

        let current = policy.only_tracked(&entity.attributes());
        let record = VersionRecord {
            entity_type: key.entity_type.clone(),
            entity_id: key.entity_id.clone(),
            version: 1,
            old_values: current.keys().map(|k| (k.clone(), Value::Null)).collect(),
            new_values: current,
            is_snapshot: true,
            actor_id: self.actor_id(),
            created_at: now_rfc3339(),
        };
        self.store.insert(record.clone()).await?;
        debug!(entity = %key, "initialized version history");

        self.move_pointer(entity, 1).await?;
        self.publish(&record);
        Ok(Some(record))
    }

    /// `None` when the wait elapsed; the caller skips recording.
    async fn lock(&self, key: &EntityKey) -> Result<Option<LockGuard>, RewindError> {
        match self.locks.acquire(key, self.config.lock_wait()).await {
            Ok(guard) => Ok(Some(guard)),
            Err(RewindError::LockTimeout { waited_ms, .. }) => {
                warn!(entity = %key, waited_ms, "version lock not acquired, skipping record");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn move_pointer<E>(&self, entity: &mut E, version: u64) -> Result<(), RewindError>
    where
        E: Entity + ?Sized,
    {
        if !entity.has_version_pointer() || !entity.exists() {
            return Ok(());
        }
        let gate = entity.events().clone();
        let _quiet = gate.suppress();
        entity.set_version_pointer(Some(version));
        entity.persist().await
    }

    fn actor_id(&self) -> Option<String> {
        if self.config.track_actor {
            self.actor.current_actor()
        } else {
            None
        }
    }

    fn publish(&self, record: &VersionRecord) {
        self.events.publish(VersionEvent::Created {
            key: record.key(),
            version: record.version,
            is_snapshot: record.is_snapshot,
        });
    }
}

impl std::fmt::Debug for VersionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionRecorder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
