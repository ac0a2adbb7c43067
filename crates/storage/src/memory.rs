//! In-process `VersionStore` backed by ordered maps.
//!
//! Used by tests and by hosts that keep history only for the lifetime of the
//! process. Durable backends implement the same trait and can be checked with
//! [`crate::conformance::run_conformance_suite`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{EntityKey, VersionRecord};
use crate::traits::VersionStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<EntityKey, BTreeMap<u64, VersionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all entities.
    pub async fn len(&self) -> usize {
        self.entities.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn insert(&self, record: VersionRecord) -> Result<(), StorageError> {
        if record.version == 0 {
            return Err(StorageError::InvalidVersion {
                entity_type: record.entity_type,
                entity_id: record.entity_id,
                version: 0,
            });
        }

        let mut entities = self.entities.write().await;
        let history = entities.entry(record.key()).or_default();
        if history.contains_key(&record.version) {
            return Err(StorageError::DuplicateVersion {
                entity_type: record.entity_type,
                entity_id: record.entity_id,
                version: record.version,
            });
        }
        history.insert(record.version, record);
        Ok(())
    }

    async fn delete_all_for_entity(&self, key: &EntityKey) -> Result<u64, StorageError> {
        let removed = self.entities.write().await.remove(key);
        Ok(removed.map(|history| history.len() as u64).unwrap_or(0))
    }

    async fn max_version(&self, key: &EntityKey) -> Result<u64, StorageError> {
        let entities = self.entities.read().await;
        Ok(entities
            .get(key)
            .and_then(|history| history.keys().next_back().copied())
            .unwrap_or(0))
    }

    async fn min_version(&self, key: &EntityKey) -> Result<u64, StorageError> {
        let entities = self.entities.read().await;
        Ok(entities
            .get(key)
            .and_then(|history| history.keys().next().copied())
            .unwrap_or(0))
    }

    async fn find_by_version(
        &self,
        key: &EntityKey,
        version: u64,
    ) -> Result<Option<VersionRecord>, StorageError> {
        let entities = self.entities.read().await;
        Ok(entities
            .get(key)
            .and_then(|history| history.get(&version))
            .cloned())
    }

    async fn range(
        &self,
        key: &EntityKey,
        from: u64,
        to: u64,
    ) -> Result<Vec<VersionRecord>, StorageError> {
        if from > to {
            return Ok(Vec::new());
        }
        let entities = self.entities.read().await;
        Ok(entities
            .get(key)
            .map(|history| history.range(from..=to).map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    async fn all_for_entity(&self, key: &EntityKey) -> Result<Vec<VersionRecord>, StorageError> {
        let entities = self.entities.read().await;
        Ok(entities
            .get(key)
            .map(|history| history.values().cloned().collect())
            .unwrap_or_default())
    }
}
