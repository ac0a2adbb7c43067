use rewind_storage::{EntityKey, StorageError};

/// Errors surfaced by the rewind engine.
#[derive(Debug, thiserror::Error)]
pub enum RewindError {
    /// The entity does not declare a versioning profile.
    #[error("{entity_type} is not version-tracked")]
    NotVersionTracked { entity_type: String },

    /// The entity type has no storage for the current-version pointer.
    #[error("{entity_type} has no current-version pointer column")]
    MissingVersionPointer { entity_type: String },

    /// The requested version has no record for this entity.
    #[error("version {version} does not exist for {entity_type}/{entity_id}")]
    VersionNotFound {
        entity_type: String,
        entity_id: String,
        version: u64,
    },

    /// The per-entity recording lock was not acquired within the bound.
    /// The recorder recovers from this locally; it is only returned by
    /// [`crate::LockProvider::acquire`].
    #[error("timed out after {waited_ms}ms waiting for the version lock on {entity_type}/{entity_id}")]
    LockTimeout {
        entity_type: String,
        entity_id: String,
        waited_ms: u64,
    },

    /// Configuration rejected at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The host failed to persist the entity.
    #[error("failed to persist entity: {0}")]
    Persist(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RewindError {
    pub(crate) fn version_not_found(key: &EntityKey, version: u64) -> Self {
        RewindError::VersionNotFound {
            entity_type: key.entity_type.clone(),
            entity_id: key.entity_id.clone(),
            version,
        }
    }
}
