//! Engine configuration.
//!
//! Loaded once and passed into [`crate::Rewind`] at construction; nothing in
//! the engine reads configuration ambiently.
//!
//! # Example
//!
//! ```toml
//! snapshot_interval = 10
//! record_rewind_actions = false
//! track_actor = true
//! tracks_all_by_default = false
//! lock_wait_ms = 10000
//! store = "memory"
//!
//! [excluded_attributes]
//! Post = ["view_count"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RewindError;

pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 10;
pub const DEFAULT_LOCK_WAIT_MS: u64 = 10_000;
pub const DEFAULT_STORE: &str = "memory";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewindConfig {
    /// Every Nth version is written as a full snapshot.
    pub snapshot_interval: u64,
    /// Log undo/redo/goto as new forward versions.
    pub record_rewind_actions: bool,
    /// Attribute each version to the actor reported by the `ActorResolver`.
    pub track_actor: bool,
    /// Entities with `Tracked::Default` track every attribute when set,
    /// nothing otherwise.
    pub tracks_all_by_default: bool,
    /// Bounded wait for the per-entity recording lock.
    pub lock_wait_ms: u64,
    /// Extra exclusions keyed by entity type.
    pub excluded_attributes: BTreeMap<String, Vec<String>>,
    /// Name of the `VersionStore` backend in the `StoreRegistry`.
    pub store: String,
}

impl Default for RewindConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            record_rewind_actions: false,
            track_actor: true,
            tracks_all_by_default: false,
            lock_wait_ms: DEFAULT_LOCK_WAIT_MS,
            excluded_attributes: BTreeMap::new(),
            store: DEFAULT_STORE.to_string(),
        }
    }
}

impl RewindConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, RewindError> {
        let config: RewindConfig = toml::from_str(content)
            .map_err(|e| RewindError::InvalidConfiguration(format!("could not parse: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML config file from `path`.
    pub fn load(path: &Path) -> Result<Self, RewindError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RewindError::InvalidConfiguration(format!(
                "could not read '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), RewindError> {
        if self.snapshot_interval == 0 {
            return Err(RewindError::InvalidConfiguration(
                "snapshot_interval must be a positive integer".to_string(),
            ));
        }
        if self.lock_wait_ms == 0 {
            return Err(RewindError::InvalidConfiguration(
                "lock_wait_ms must be greater than zero".to_string(),
            ));
        }
        if self.store.trim().is_empty() {
            return Err(RewindError::InvalidConfiguration(
                "store must name a registered backend".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// Config-level exclusions for `entity_type` (empty if none).
    pub fn excluded_for(&self, entity_type: &str) -> &[String] {
        self.excluded_attributes
            .get(entity_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
