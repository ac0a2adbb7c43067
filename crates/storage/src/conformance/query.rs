//! Query conformance tests.
//!
//! Aggregates default to 0 on empty history; scans return records in
//! ascending version order regardless of insertion order.

use std::future::Future;

use super::{make_record, post_key, seed, TestResult};
use crate::VersionStore;

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "query",
        "empty_history_aggregates_are_zero",
        empty_history_aggregates_are_zero(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "max_and_min_track_inserted_versions",
        max_and_min_track_inserted_versions(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "find_missing_version_returns_none",
        find_missing_version_returns_none(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "all_for_entity_sorted_ascending",
        all_for_entity_sorted_ascending(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "range_is_inclusive_and_ordered",
        range_is_inclusive_and_ordered(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "range_inverted_bounds_is_empty",
        range_inverted_bounds_is_empty(factory).await,
    ));
    results.push(TestResult::from_result(
        "query",
        "snapshot_flag_round_trips",
        snapshot_flag_round_trips(factory).await,
    ));

    results
}

async fn empty_history_aggregates_are_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("missing");

    let max = store.max_version(&key).await.map_err(|e| format!("max: {e}"))?;
    let min = store.min_version(&key).await.map_err(|e| format!("min: {e}"))?;
    let all = store
        .all_for_entity(&key)
        .await
        .map_err(|e| format!("all: {e}"))?;

    if max != 0 || min != 0 {
        return Err(format!("expected max=0 min=0, got max={max} min={min}"));
    }
    if !all.is_empty() {
        return Err(format!("expected no records, got {}", all.len()));
    }
    Ok(())
}

async fn max_and_min_track_inserted_versions<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");

    // Non-contiguous versions: 3, 7, 5.
    for version in [3, 7, 5] {
        store
            .insert(make_record(&key, version, version == 3))
            .await
            .map_err(|e| format!("insert v{version}: {e}"))?;
    }

    let max = store.max_version(&key).await.map_err(|e| format!("max: {e}"))?;
    let min = store.min_version(&key).await.map_err(|e| format!("min: {e}"))?;
    if max != 7 {
        return Err(format!("expected max 7, got {max}"));
    }
    if min != 3 {
        return Err(format!("expected min 3, got {min}"));
    }
    Ok(())
}

async fn find_missing_version_returns_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");
    seed(&store, &key, 3).await?;

    let found = store
        .find_by_version(&key, 4)
        .await
        .map_err(|e| format!("find: {e}"))?;
    if found.is_some() {
        return Err("expected None for version 4".to_string());
    }
    Ok(())
}

async fn all_for_entity_sorted_ascending<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");

    for version in [4, 1, 3, 2] {
        store
            .insert(make_record(&key, version, version == 1))
            .await
            .map_err(|e| format!("insert v{version}: {e}"))?;
    }
    // Another entity's records must not leak in.
    seed(&store, &post_key("post-2"), 2).await?;

    let versions: Vec<u64> = store
        .all_for_entity(&key)
        .await
        .map_err(|e| format!("all: {e}"))?
        .iter()
        .map(|r| r.version)
        .collect();
    if versions != vec![1, 2, 3, 4] {
        return Err(format!("expected [1, 2, 3, 4], got {versions:?}"));
    }
    Ok(())
}

async fn range_is_inclusive_and_ordered<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");
    seed(&store, &key, 12).await?;

    let versions: Vec<u64> = store
        .range(&key, 4, 10)
        .await
        .map_err(|e| format!("range: {e}"))?
        .iter()
        .map(|r| r.version)
        .collect();
    if versions != (4..=10).collect::<Vec<_>>() {
        return Err(format!("expected 4..=10, got {versions:?}"));
    }
    Ok(())
}

async fn range_inverted_bounds_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");
    seed(&store, &key, 5).await?;

    let records = store
        .range(&key, 4, 2)
        .await
        .map_err(|e| format!("range: {e}"))?;
    if !records.is_empty() {
        return Err(format!("expected empty range, got {} records", records.len()));
    }
    Ok(())
}

async fn snapshot_flag_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let key = post_key("post-1");
    seed(&store, &key, 11).await?;

    let snapshots: Vec<u64> = store
        .all_for_entity(&key)
        .await
        .map_err(|e| format!("all: {e}"))?
        .iter()
        .filter(|r| r.is_snapshot)
        .map(|r| r.version)
        .collect();
    if snapshots != vec![1, 10] {
        return Err(format!("expected snapshots [1, 10], got {snapshots:?}"));
    }
    Ok(())
}
