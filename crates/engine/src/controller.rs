//! Navigation over an entity's version history.
//!
//! Every operation loads the entity's history, asks the planner for the
//! cheapest path from the current version to the target, and materializes
//! the target with the reconstructor. Mutating operations write the restored
//! attributes with recording suppressed, then optionally log the restore as
//! a new forward version.

use std::sync::Arc;

use rewind_storage::{AttributeMap, VersionStore};
use tracing::{debug, info, warn};

use crate::config::RewindConfig;
use crate::entity::{AttributePolicy, Entity};
use crate::error::RewindError;
use crate::history::History;
use crate::planner::plan;
use crate::reconstruct::build_attributes;
use crate::recorder::VersionRecorder;

pub struct RewindController {
    store: Arc<dyn VersionStore>,
    config: Arc<RewindConfig>,
    recorder: Arc<VersionRecorder>,
}

impl RewindController {
    pub(crate) fn new(
        store: Arc<dyn VersionStore>,
        config: Arc<RewindConfig>,
        recorder: Arc<VersionRecorder>,
    ) -> Self {
        Self {
            store,
            config,
            recorder,
        }
    }

    /// Step back one version. `false` at the first version or when the
    /// previous version has no record.
    pub async fn undo<E>(&self, entity: &mut E) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        let (policy, history) = self.navigable(entity).await?;
        let current = current_version(entity, &history);
        if current <= 1 || !history.contains(current - 1) {
            return Ok(false);
        }
        self.restore(entity, &policy, &history, current, current - 1).await
    }

    /// Step forward one version. `false` when there is no next version.
    pub async fn redo<E>(&self, entity: &mut E) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        let (policy, history) = self.navigable(entity).await?;
        let current = current_version(entity, &history);
        if !history.contains(current + 1) {
            return Ok(false);
        }
        self.restore(entity, &policy, &history, current, current + 1).await
    }

    /// Move back `steps` versions, stopping at the lowest recorded version.
    /// A target with no record falls back to the lowest version.
    pub async fn rewind<E>(&self, entity: &mut E, steps: u64) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        let (policy, history) = self.navigable(entity).await?;
        if history.is_empty() {
            return Ok(false);
        }
        let current = current_version(entity, &history);
        let mut target = current.saturating_sub(steps).max(history.min_version());
        if !history.contains(target) {
            target = history.min_version();
        }
        self.restore(entity, &policy, &history, current, target).await
    }

    /// Move forward `steps` versions, stopping at the highest recorded version.
    /// A target with no record falls back to the highest version.
    pub async fn fast_forward<E>(&self, entity: &mut E, steps: u64) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        let (policy, history) = self.navigable(entity).await?;
        if history.is_empty() {
            return Ok(false);
        }
        let current = current_version(entity, &history);
        let mut target = current.saturating_add(steps).min(history.max_version());
        if !history.contains(target) {
            target = history.max_version();
        }
        self.restore(entity, &policy, &history, current, target).await
    }

    /// Jump to `version`, which must exist.
    pub async fn go_to<E>(&self, entity: &mut E, version: u64) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        let (policy, history) = self.navigable(entity).await?;
        if !history.contains(version) {
            return Err(RewindError::version_not_found(&entity.entity_key(), version));
        }
        let current = current_version(entity, &history);
        self.restore(entity, &policy, &history, current, version).await
    }

    /// Tracked attributes as of `version`. Reads only.
    pub async fn attributes_at<E>(
        &self,
        entity: &E,
        version: u64,
    ) -> Result<AttributeMap, RewindError>
    where
        E: Entity + ?Sized,
    {
        let policy = AttributePolicy::resolve(entity, &self.config)?;
        let history = History::load(self.store.as_ref(), &entity.entity_key()).await?;
        if !history.contains(version) {
            return Err(RewindError::version_not_found(&entity.entity_key(), version));
        }
        let current = current_version(entity, &history);
        let route = plan(&history.summaries(), current, version);
        debug!(
            entity = %entity.entity_key(),
            current,
            target = version,
            method = ?route.method,
            cost = route.cost,
            "reading attributes"
        );
        Ok(build_attributes(
            &entity.attributes(),
            &history,
            &policy,
            &route,
            current,
            version,
        ))
    }

    /// A new entity holding the attributes `entity` had at `version`.
    ///
    /// The copy starts its own history: it is persisted and recorded as its
    /// own first version.
    pub async fn clone_at<E>(&self, entity: &E, version: u64) -> Result<E, RewindError>
    where
        E: Entity,
    {
        let attributes = self.attributes_at(entity, version).await?;

        let mut copy = entity.replicate();
        copy.apply_attributes(&attributes);
        copy.set_version_pointer(None);
        {
            let gate = copy.events().clone();
            let _quiet = gate.suppress();
            copy.persist().await?;
        }
        if let Err(err) = self.recorder.record(&mut copy).await {
            warn!(entity = %copy.entity_key(), error = %err, "failed to record clone");
        }
        copy.clear_changes();

        info!(
            source = %entity.entity_key(),
            clone = %copy.entity_key(),
            version,
            "cloned entity"
        );
        Ok(copy)
    }

    /// Capability checks shared by the pointer-moving operations.
    async fn navigable<E>(&self, entity: &E) -> Result<(AttributePolicy, History), RewindError>
    where
        E: Entity + ?Sized,
    {
        let policy = AttributePolicy::resolve(entity, &self.config)?;
        if !entity.has_version_pointer() {
            return Err(RewindError::MissingVersionPointer {
                entity_type: entity.entity_key().entity_type,
            });
        }
        let history = History::load(self.store.as_ref(), &entity.entity_key()).await?;
        Ok((policy, history))
    }

    async fn restore<E>(
        &self,
        entity: &mut E,
        policy: &AttributePolicy,
        history: &History,
        current: u64,
        target: u64,
    ) -> Result<bool, RewindError>
    where
        E: Entity + ?Sized,
    {
        if current == target {
            return Ok(false);
        }

        let route = plan(&history.summaries(), current, target);
        let attributes =
            build_attributes(&entity.attributes(), history, policy, &route, current, target);

        entity.apply_attributes(&attributes);
        entity.set_version_pointer(Some(target));
        {
            let gate = entity.events().clone();
            let _quiet = gate.suppress();
            entity.persist().await?;
        }
        info!(
            entity = %entity.entity_key(),
            from = current,
            to = target,
            method = ?route.method,
            cost = route.cost,
            "restored version"
        );

        if self.config.record_rewind_actions {
            if let Err(err) = self.recorder.record_restore(entity).await {
                warn!(entity = %entity.entity_key(), error = %err, "failed to record restore");
            }
        }
        entity.clear_changes();
        Ok(true)
    }
}

impl std::fmt::Debug for RewindController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewindController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The pointer when the entity has one, otherwise the newest version.
pub(crate) fn current_version<E>(entity: &E, history: &History) -> u64
where
    E: Entity + ?Sized,
{
    if entity.has_version_pointer() {
        if let Some(pointer) = entity.version_pointer() {
            return pointer;
        }
    }
    history.max_version()
}
