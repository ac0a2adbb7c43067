use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute name -> value. Ordered so that stored diffs serialize deterministically.
pub type AttributeMap = BTreeMap<String, serde_json::Value>;

/// Identity of a version-tracked entity: its type plus its id within that type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityKey {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// One entry in an entity's version history.
///
/// Records are immutable once inserted. A snapshot record's `new_values`
/// holds every tracked attribute; a diff record's maps hold only the
/// attributes that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub entity_type: String,
    pub entity_id: String,
    /// Positive, unique per entity.
    pub version: u64,
    pub old_values: AttributeMap,
    pub new_values: AttributeMap,
    pub is_snapshot: bool,
    pub actor_id: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
}

impl VersionRecord {
    /// The identity of the entity this record belongs to.
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type.clone(), self.entity_id.clone())
    }

    pub fn belongs_to(&self, key: &EntityKey) -> bool {
        self.entity_type == key.entity_type && self.entity_id == key.entity_id
    }
}
