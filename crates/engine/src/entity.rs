//! The host-record collaborator.
//!
//! The engine never owns entity storage. Hosts implement [`Entity`] for their
//! record types and call the lifecycle hooks on [`crate::Rewind`] after each
//! persist or removal.
//!
//! Save protocol expected from the host:
//! 1. mutate attributes (the entity tracks its dirty set and original values)
//! 2. `persist()`
//! 3. `Rewind::after_save(&mut entity)` while the dirty set is still intact
//! 4. `clear_changes()`

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rewind_storage::{AttributeMap, EntityKey};
use serde_json::Value;

use crate::config::RewindConfig;
use crate::error::RewindError;

/// Attributes never versioned regardless of profile, besides the key name.
pub const ALWAYS_EXCLUDED: [&str; 3] = ["created_at", "updated_at", "current_version"];

/// Which attributes an entity versions before exclusions are removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Tracked {
    /// Defer to `RewindConfig::tracks_all_by_default`.
    #[default]
    Default,
    All,
    /// Explicit allow-list.
    Only(Vec<String>),
}

/// Versioning capability of an entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versioning {
    pub tracked: Tracked,
    /// Caller-declared exclusions, on top of the key and [`ALWAYS_EXCLUDED`].
    pub excluded: Vec<String>,
}

impl Versioning {
    pub fn all() -> Self {
        Self {
            tracked: Tracked::All,
            excluded: Vec::new(),
        }
    }

    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracked: Tracked::Only(names.into_iter().map(Into::into).collect()),
            excluded: Vec::new(),
        }
    }

    pub fn excluding<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }
}

/// A record whose attribute history can be versioned.
#[async_trait]
pub trait Entity: Send + Sync {
    fn entity_key(&self) -> EntityKey;

    /// Name of the identity attribute. Never versioned.
    fn key_name(&self) -> &str {
        "id"
    }

    /// `None` means the entity is not version-tracked.
    fn versioning(&self) -> Option<Versioning>;

    /// Every attribute the entity currently holds.
    fn attributes(&self) -> AttributeMap;

    /// Value of `name` before the in-flight mutation, `None` if it had none.
    fn original_value(&self, name: &str) -> Option<Value>;

    /// Attributes changed by the in-flight mutation.
    fn changed_attributes(&self) -> BTreeSet<String>;

    /// The in-flight mutation inserted the entity.
    fn was_created(&self) -> bool;

    /// False once the entity has been removed.
    fn exists(&self) -> bool;

    fn has_version_pointer(&self) -> bool;
    fn version_pointer(&self) -> Option<u64>;
    fn set_version_pointer(&mut self, version: Option<u64>);

    /// Overwrite the named attributes; attributes not in `attributes` are untouched.
    fn apply_attributes(&mut self, attributes: &AttributeMap);

    async fn persist(&mut self) -> Result<(), RewindError>;

    /// End the in-flight mutation: originals become current, dirty set empties.
    fn clear_changes(&mut self);

    fn events(&self) -> &EventGate;

    /// A copy with a fresh identity and no version pointer, not yet persisted.
    fn replicate(&self) -> Self
    where
        Self: Sized;
}

/// Resolved attribute rules for one entity under one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePolicy {
    excluded: BTreeSet<String>,
    tracked: Tracked,
    tracks_all_by_default: bool,
}

impl AttributePolicy {
    /// Resolve the policy, or `NotVersionTracked` if the entity has no profile.
    pub fn resolve<E: Entity + ?Sized>(
        entity: &E,
        config: &RewindConfig,
    ) -> Result<Self, RewindError> {
        let key = entity.entity_key();
        let versioning = entity
            .versioning()
            .ok_or_else(|| RewindError::NotVersionTracked {
                entity_type: key.entity_type.clone(),
            })?;

        let excluded = versioning
            .excluded
            .into_iter()
            .chain(config.excluded_for(&key.entity_type).iter().cloned());

        Ok(Self::new(
            entity.key_name(),
            versioning.tracked,
            excluded,
            config.tracks_all_by_default,
        ))
    }

    pub fn new<I, S>(
        key_name: &str,
        tracked: Tracked,
        excluded: I,
        tracks_all_by_default: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: BTreeSet<String> = ALWAYS_EXCLUDED.iter().map(|s| s.to_string()).collect();
        set.insert(key_name.to_string());
        set.extend(excluded.into_iter().map(Into::into));
        Self {
            excluded: set,
            tracked,
            tracks_all_by_default,
        }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(name)
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        if self.is_excluded(name) {
            return false;
        }
        match &self.tracked {
            Tracked::All => true,
            Tracked::Only(names) => names.iter().any(|n| n == name),
            Tracked::Default => self.tracks_all_by_default,
        }
    }

    /// Tracked attribute names present in `attributes`, in key order.
    pub fn tracked_names(&self, attributes: &AttributeMap) -> Vec<String> {
        attributes
            .keys()
            .filter(|name| self.is_tracked(name))
            .cloned()
            .collect()
    }

    /// `attributes` with every excluded key removed.
    pub fn strip_excluded(&self, attributes: &AttributeMap) -> AttributeMap {
        attributes
            .iter()
            .filter(|(name, _)| !self.is_excluded(name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// `attributes` restricted to tracked keys.
    pub fn only_tracked(&self, attributes: &AttributeMap) -> AttributeMap {
        attributes
            .iter()
            .filter(|(name, _)| self.is_tracked(name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<BTreeMap<_, _>>()
    }
}

/// Suppression switch for version recording on one entity.
///
/// Cloning shares the counter. Guards nest: recording resumes only when the
/// last outstanding guard is dropped.
#[derive(Debug, Clone, Default)]
pub struct EventGate {
    depth: Arc<AtomicUsize>,
}

impl EventGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suppress(&self) -> SuppressionGuard {
        self.depth.fetch_add(1, Ordering::SeqCst);
        SuppressionGuard {
            depth: Arc::clone(&self.depth),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }
}

/// Restores the prior suppression state when dropped.
#[derive(Debug)]
#[must_use = "recording resumes as soon as the guard is dropped"]
pub struct SuppressionGuard {
    depth: Arc<AtomicUsize>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
