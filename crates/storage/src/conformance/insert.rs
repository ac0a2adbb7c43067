//! Insert conformance tests.
//!
//! Verifies append semantics: inserted records are readable verbatim, version
//! numbers are unique per entity, and uniqueness is scoped to one entity.

use std::future::Future;

use super::{make_record, post_key, TestResult};
use crate::{EntityKey, StorageError, VersionStore};

pub(super) async fn run_insert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "insert",
        "insert_then_find_returns_identical_record",
        insert_then_find_returns_identical_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "duplicate_version_rejected",
        duplicate_version_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "duplicate_does_not_overwrite_original",
        duplicate_does_not_overwrite_original(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "version_zero_rejected",
        version_zero_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "same_version_allowed_for_different_entities",
        same_version_allowed_for_different_entities(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "same_id_different_type_is_distinct_entity",
        same_id_different_type_is_distinct_entity(factory).await,
    ));

    results
}

async fn insert_then_find_returns_identical_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");
    let record = make_record(&key, 1, true);

    store
        .insert(record.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let found = store
        .find_by_version(&key, 1)
        .await
        .map_err(|e| format!("find: {e}"))?
        .ok_or("record not found after insert")?;

    if found != record {
        return Err(format!("expected {record:?}, got {found:?}"));
    }
    Ok(())
}

async fn duplicate_version_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");

    store
        .insert(make_record(&key, 1, true))
        .await
        .map_err(|e| format!("first insert: {e}"))?;

    match store.insert(make_record(&key, 1, false)).await {
        Err(StorageError::DuplicateVersion {
            entity_type,
            entity_id,
            version,
        }) => {
            if entity_type != "Post" || entity_id != "post-1" || version != 1 {
                return Err(format!(
                    "duplicate error has wrong fields: {entity_type}/{entity_id} v{version}"
                ));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected DuplicateVersion, got {e}")),
        Ok(()) => Err("expected DuplicateVersion, insert succeeded".to_string()),
    }
}

async fn duplicate_does_not_overwrite_original<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");
    let original = make_record(&key, 1, true);

    store
        .insert(original.clone())
        .await
        .map_err(|e| format!("first insert: {e}"))?;
    let _ = store.insert(make_record(&key, 1, false)).await;

    let found = store
        .find_by_version(&key, 1)
        .await
        .map_err(|e| format!("find: {e}"))?
        .ok_or("record vanished after rejected duplicate")?;
    if !found.is_snapshot {
        return Err("rejected duplicate overwrote the stored record".to_string());
    }
    Ok(())
}

async fn version_zero_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");

    match store.insert(make_record(&key, 0, true)).await {
        Err(StorageError::InvalidVersion { version: 0, .. }) => Ok(()),
        Err(e) => Err(format!("expected InvalidVersion, got {e}")),
        Ok(()) => Err("expected InvalidVersion, insert succeeded".to_string()),
    }
}

async fn same_version_allowed_for_different_entities<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;

    store
        .insert(make_record(&post_key("post-1"), 1, true))
        .await
        .map_err(|e| format!("insert post-1: {e}"))?;
    store
        .insert(make_record(&post_key("post-2"), 1, true))
        .await
        .map_err(|e| format!("insert post-2: {e}"))?;

    Ok(())
}

async fn same_id_different_type_is_distinct_entity<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let post = post_key("1");
    let comment = EntityKey::new("Comment", "1");

    store
        .insert(make_record(&post, 1, true))
        .await
        .map_err(|e| format!("insert post: {e}"))?;
    store
        .insert(make_record(&comment, 1, true))
        .await
        .map_err(|e| format!("insert comment: {e}"))?;
    store
        .insert(make_record(&comment, 2, false))
        .await
        .map_err(|e| format!("insert comment v2: {e}"))?;

    let post_max = store
        .max_version(&post)
        .await
        .map_err(|e| format!("max post: {e}"))?;
    if post_max != 1 {
        return Err(format!("Post/1 max should be 1, got {post_max}"));
    }
    Ok(())
}
