//! In-memory view of one entity's version records.

use std::collections::BTreeMap;

use rewind_storage::{AttributeMap, EntityKey, StorageError, VersionRecord, VersionStore};

use crate::entity::AttributePolicy;
use crate::planner::VersionSummary;

/// The loaded version records of one entity, keyed by version.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: BTreeMap<u64, VersionRecord>,
}

impl History {
    pub fn new(records: impl IntoIterator<Item = VersionRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.version, r)).collect(),
        }
    }

    /// Load every record for `key` from the store.
    pub async fn load(store: &dyn VersionStore, key: &EntityKey) -> Result<Self, StorageError> {
        Ok(Self::new(store.all_for_entity(key).await?))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, version: u64) -> Option<&VersionRecord> {
        self.records.get(&version)
    }

    pub fn contains(&self, version: u64) -> bool {
        self.records.contains_key(&version)
    }

    /// Lowest recorded version, 0 when empty.
    pub fn min_version(&self) -> u64 {
        self.records.keys().next().copied().unwrap_or(0)
    }

    /// Highest recorded version, 0 when empty.
    pub fn max_version(&self) -> u64 {
        self.records.keys().next_back().copied().unwrap_or(0)
    }

    pub fn records(&self) -> impl Iterator<Item = &VersionRecord> {
        self.records.values()
    }

    /// Records with `from <= version <= to`, ascending.
    pub fn between(
        &self,
        from: u64,
        to: u64,
    ) -> impl DoubleEndedIterator<Item = &VersionRecord> {
        let range = if from <= to {
            self.records.range(from..=to)
        } else {
            self.records.range(0..0)
        };
        range.map(|(_, r)| r)
    }

    pub fn summaries(&self) -> Vec<VersionSummary> {
        self.records
            .values()
            .map(|r| VersionSummary {
                version: r.version,
                is_snapshot: r.is_snapshot,
            })
            .collect()
    }

    /// The snapshot with the highest version.
    pub fn latest_snapshot(&self) -> Option<&VersionRecord> {
        self.records.values().rev().find(|r| r.is_snapshot)
    }

    /// State at the head of linear history: the latest snapshot's values with
    /// every later record's `new_values` merged on in order.
    pub fn rebuild_head(&self, policy: &AttributePolicy) -> AttributeMap {
        let snapshot = self.latest_snapshot();
        let mut state = snapshot
            .map(|s| s.new_values.clone())
            .unwrap_or_default();
        let after = snapshot.map(|s| s.version).unwrap_or(0);

        for record in self.between(after + 1, u64::MAX) {
            merge(&mut state, &record.new_values);
        }
        policy.strip_excluded(&state)
    }
}

/// Overwrite keys of `base` with `overlay`; keys absent from `overlay` are untouched.
pub(crate) fn merge(base: &mut AttributeMap, overlay: &AttributeMap) {
    for (name, value) in overlay {
        base.insert(name.clone(), value.clone());
    }
}
