use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{EntityKey, VersionRecord};

/// The storage trait for rewind version-history backends.
///
/// A `VersionStore` is an append-only table of [`VersionRecord`]s keyed by
/// `(entity_type, entity_id, version)`. Records are never edited after
/// insertion; the only destructive operation is
/// [`delete_all_for_entity`](VersionStore::delete_all_for_entity), used when
/// the owning entity is permanently destroyed.
///
/// ## Uniqueness
///
/// `insert` must reject a record whose version already exists for the same
/// entity with `Err(StorageError::DuplicateVersion { .. })`. The recorder
/// serializes writers per entity, so a duplicate indicates a caller bug or a
/// second writer bypassing the lock; the store is the last line that keeps
/// version numbers unique.
///
/// ## Visibility
///
/// Readers only see durably inserted records. Since records are immutable,
/// reads need no lock.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// behind `Arc<dyn VersionStore>` across async task boundaries.
#[async_trait]
pub trait VersionStore: Send + Sync + 'static {
    // ── Writes ───────────────────────────────────────────────────────────────

    /// Insert a new version record.
    ///
    /// Returns `Err(StorageError::DuplicateVersion)` if the entity already has
    /// a record at `record.version`, and `Err(StorageError::InvalidVersion)`
    /// for version 0.
    async fn insert(&self, record: VersionRecord) -> Result<(), StorageError>;

    /// Delete every record belonging to `key`. Returns how many were removed.
    async fn delete_all_for_entity(&self, key: &EntityKey) -> Result<u64, StorageError>;

    // ── Aggregates ───────────────────────────────────────────────────────────

    /// Highest version recorded for `key`, or 0 when there is none.
    async fn max_version(&self, key: &EntityKey) -> Result<u64, StorageError>;

    /// Lowest version recorded for `key`, or 0 when there is none.
    async fn min_version(&self, key: &EntityKey) -> Result<u64, StorageError>;

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Read a single record. `Ok(None)` if `key` has no record at `version`.
    async fn find_by_version(
        &self,
        key: &EntityKey,
        version: u64,
    ) -> Result<Option<VersionRecord>, StorageError>;

    /// Records with `from <= version <= to`, ordered by version ascending.
    async fn range(
        &self,
        key: &EntityKey,
        from: u64,
        to: u64,
    ) -> Result<Vec<VersionRecord>, StorageError>;

    /// Every record for `key`, ordered by version ascending.
    async fn all_for_entity(&self, key: &EntityKey) -> Result<Vec<VersionRecord>, StorageError>;
}
