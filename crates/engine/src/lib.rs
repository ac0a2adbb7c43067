//! Versioned records: undo, redo, goto and clone over an entity's attribute
//! history.
//!
//! Every recorded mutation of a tracked entity becomes a [`VersionRecord`]
//! holding the changed attributes before and after, with periodic full
//! snapshots. Any historical state is rebuilt by replaying diffs along the
//! cheapest path the planner finds.
//!
//! Hosts own their entities. They implement [`Entity`] and call
//! [`Rewind::after_save`] / [`Rewind::after_remove`] from their persistence
//! layer; [`Rewind`] does the rest.

mod actor;
mod config;
mod controller;
mod entity;
mod error;
mod events;
mod history;
mod lock;
pub mod planner;
pub mod reconstruct;
mod recorder;
mod registry;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

pub use actor::{ActorResolver, FixedActor, NoActor};
pub use config::{RewindConfig, DEFAULT_LOCK_WAIT_MS, DEFAULT_SNAPSHOT_INTERVAL, DEFAULT_STORE};
pub use controller::RewindController;
pub use entity::{
    AttributePolicy, Entity, EventGate, SuppressionGuard, Tracked, Versioning, ALWAYS_EXCLUDED,
};
pub use error::RewindError;
pub use events::{VersionEvent, EVENT_CAPACITY};
pub use history::History;
pub use lock::{LocalLocks, LockGuard, LockProvider};
pub use planner::{Method, Plan, VersionSummary};
pub use recorder::VersionRecorder;
pub use registry::StoreRegistry;
pub use rewind_storage::{AttributeMap, EntityKey, MemoryStore, VersionRecord, VersionStore};

use events::EventBus;

/// How an entity was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The row remains with a deletion marker; recorded as a version.
    Soft,
    /// The row is gone; its history is purged.
    Hard,
}

/// Entry point: lifecycle hooks plus navigation, over one store and one
/// configuration.
pub struct Rewind {
    store: Arc<dyn VersionStore>,
    config: Arc<RewindConfig>,
    locks: Arc<dyn LockProvider>,
    actor: Arc<dyn ActorResolver>,
    events: EventBus,
    recorder: Arc<VersionRecorder>,
    controller: RewindController,
}

impl Rewind {
    /// Validates `config` and wires the engine over `store` with in-process
    /// locks and no actor attribution.
    pub fn new(store: Arc<dyn VersionStore>, config: RewindConfig) -> Result<Self, RewindError> {
        config.validate()?;
        Ok(Self::assemble(
            store,
            Arc::new(config),
            Arc::new(LocalLocks::new()),
            Arc::new(NoActor),
            EventBus::new(),
        ))
    }

    /// Like [`Rewind::new`], with the store chosen by `config.store`.
    pub fn from_config(
        config: RewindConfig,
        registry: &StoreRegistry,
    ) -> Result<Self, RewindError> {
        config.validate()?;
        let store = registry.resolve(&config.store)?;
        debug!(store = %config.store, "resolved version store");
        Self::new(store, config)
    }

    /// Replace the lock provider, e.g. with a distributed one.
    pub fn with_locks(self, locks: Arc<dyn LockProvider>) -> Self {
        Self::assemble(self.store, self.config, locks, self.actor, self.events)
    }

    pub fn with_actor(self, actor: Arc<dyn ActorResolver>) -> Self {
        Self::assemble(self.store, self.config, self.locks, actor, self.events)
    }

    fn assemble(
        store: Arc<dyn VersionStore>,
        config: Arc<RewindConfig>,
        locks: Arc<dyn LockProvider>,
        actor: Arc<dyn ActorResolver>,
        events: EventBus,
    ) -> Self {
        let recorder = Arc::new(VersionRecorder::new(
            Arc::clone(&store),
            Arc::clone(&config),
            Arc::clone(&locks),
            Arc::clone(&actor),
            events.clone(),
        ));
        let controller =
            RewindController::new(Arc::clone(&store), Arc::clone(&config), Arc::clone(&recorder));
        Self {
            store,
            config,
            locks,
            actor,
            events,
            recorder,
            controller,
        }
    }

    pub fn config(&self) -> &RewindConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    pub fn recorder(&self) -> &VersionRecorder {
        &self.recorder
    }

    pub fn controller(&self) -> &RewindController {
        &self.controller
    }

    /// Receive a [`VersionEvent`] for every record written from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<VersionEvent> {
        self.events.subscribe()
    }

    // Lifecycle hooks

    /// Call after each persist of `entity`, before clearing its changes.
    ///
    /// Returns the record written, if any. Failures are logged, never
    /// returned: the save has already happened.
    pub async fn after_save<E>(&self, entity: &mut E) -> Option<VersionRecord>
    where
        E: Entity + ?Sized,
    {
        if !self.should_record(entity) {
            return None;
        }
        match self.recorder.record(entity).await {
            Ok(record) => record,
            Err(err) => {
                warn!(entity = %entity.entity_key(), error = %err, "failed to record version");
                None
            }
        }
    }

    /// Call after `entity` was removed.
    ///
    /// A soft removal is recorded like a save. A hard removal purges the
    /// entity's history, even with recording suppressed.
    pub async fn after_remove<E>(&self, entity: &mut E, removal: Removal) -> Option<VersionRecord>
    where
        E: Entity + ?Sized,
    {
        if entity.versioning().is_none() {
            debug!(entity_type = %entity.entity_key().entity_type, "not version-tracked");
            return None;
        }
        let key = entity.entity_key();
        match removal {
            Removal::Soft if entity.events().is_suppressed() => None,
            Removal::Soft => match self.recorder.record_removal(entity).await {
                Ok(record) => record,
                Err(err) => {
                    warn!(entity = %key, error = %err, "failed to record removal");
                    None
                }
            },
            Removal::Hard => {
                match self.store.delete_all_for_entity(&key).await {
                    Ok(purged) => debug!(entity = %key, purged, "purged version history"),
                    Err(err) => warn!(entity = %key, error = %err, "failed to purge history"),
                }
                None
            }
        }
    }

    /// Give an entity that predates tracking its first snapshot. No-op when
    /// it already has history.
    pub async fn init_version<E>(
        &self,
        entity: &mut E,
    ) -> Result<Option<VersionRecord>, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.recorder.init_version(entity).await
    }

    fn should_record<E>(&self, entity: &E) -> bool
    where
        E: Entity + ?Sized,
    {
        if entity.events().is_suppressed() {
            return false;
        }
        if entity.versioning().is_none() {
            debug!(entity_type = %entity.entity_key().entity_type, "not version-tracked");
            return false;
        }
        true
    }

    // Reads

    /// The entity's full loaded history.
    pub async fn history<E>(&self, entity: &E) -> Result<History, RewindError>
    where
        E: Entity + ?Sized,
    {
        AttributePolicy::resolve(entity, &self.config)?;
        Ok(History::load(self.store.as_ref(), &entity.entity_key()).await?)
    }

    /// The version the entity's attributes currently reflect.
    pub async fn current_version<E>(&self, entity: &E) -> Result<u64, RewindError>
    where
        E: Entity + ?Sized,
    {
        let history = self.history(entity).await?;
        Ok(controller::current_version(entity, &history))
    }

    pub async fn attributes_at<E>(
        &self,
        entity: &E,
        version: u64,
    ) -> Result<AttributeMap, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.controller.attributes_at(entity, version).await
    }

    // Navigation

    pub async fn undo<E>(&self, entity: &mut E) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.controller.undo(entity).await
    }

    pub async fn redo<E>(&self, entity: &mut E) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.controller.redo(entity).await
    }

    pub async fn rewind<E>(&self, entity: &mut E, steps: u64) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.controller.rewind(entity, steps).await
    }

    pub async fn fast_forward<E>(&self, entity: &mut E, steps: u64) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.controller.fast_forward(entity, steps).await
    }

    pub async fn go_to<E>(&self, entity: &mut E, version: u64) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        self.controller.go_to(entity, version).await
    }

    pub async fn clone_at<E>(&self, entity: &E, version: u64) -> Result<E, RewindError>
    where
        E: Entity,
    {
        self.controller.clone_at(entity, version).await
    }
}

impl std::fmt::Debug for Rewind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rewind")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
