use std::future::Future;

use super::{make_record, post_key, seed, TestResult};
use crate::VersionStore;

pub(super) async fn run_delete_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "delete",
        "delete_all_removes_every_version",
        delete_all_removes_every_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "delete_all_leaves_other_entities",
        delete_all_leaves_other_entities(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "delete_all_on_empty_history_is_zero",
        delete_all_on_empty_history_is_zero(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "versions_restart_after_delete",
        versions_restart_after_delete(factory).await,
    ));

    results
}

async fn delete_all_removes_every_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");
    seed(&store, &key, 4).await?;

    let removed = store
        .delete_all_for_entity(&key)
        .await
        .map_err(|e| format!("delete: {e}"))?;
    if removed != 4 {
        return Err(format!("expected 4 removed, got {removed}"));
    }

    let max = store.max_version(&key).await.map_err(|e| format!("max: {e}"))?;
    if max != 0 {
        return Err(format!("expected max 0 after delete, got {max}"));
    }
    Ok(())
}

async fn delete_all_leaves_other_entities<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    seed(&store, &post_key("post-1"), 3).await?;
    seed(&store, &post_key("post-2"), 2).await?;

    store
        .delete_all_for_entity(&post_key("post-1"))
        .await
        .map_err(|e| format!("delete: {e}"))?;

    let remaining = store
        .all_for_entity(&post_key("post-2"))
        .await
        .map_err(|e| format!("all: {e}"))?;
    if remaining.len() != 2 {
        return Err(format!(
            "expected post-2 to keep 2 records, got {}",
            remaining.len()
        ));
    }
    Ok(())
}

async fn delete_all_on_empty_history_is_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let removed = store
        .delete_all_for_entity(&post_key("never-written"))
        .await
        .map_err(|e| format!("delete: {e}"))?;
    if removed != 0 {
        return Err(format!("expected 0 removed, got {removed}"));
    }
    Ok(())
}

/// A destroyed entity whose id is reused starts a fresh history.
async fn versions_restart_after_delete<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");
    seed(&store, &key, 2).await?;
    store
        .delete_all_for_entity(&key)
        .await
        .map_err(|e| format!("delete: {e}"))?;

    store
        .insert(make_record(&key, 1, true))
        .await
        .map_err(|e| format!("re-insert v1: {e}"))?;
    Ok(())
}
