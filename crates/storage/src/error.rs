/// All errors that can be returned by a VersionStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A record with this (entity_type, entity_id, version) already exists.
    /// Version numbers are never reused.
    #[error("duplicate version {version} for entity {entity_type}/{entity_id}")]
    DuplicateVersion {
        entity_type: String,
        entity_id: String,
        version: u64,
    },

    /// Version numbers start at 1.
    #[error("invalid version {version} for entity {entity_type}/{entity_id}: versions start at 1")]
    InvalidVersion {
        entity_type: String,
        entity_id: String,
        version: u64,
    },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
