use std::future::Future;
use std::sync::Arc;

use super::{make_record, post_key, TestResult};
use crate::{StorageError, VersionStore};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_insert_same_version_exactly_one_wins",
        concurrent_insert_same_version_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_inserts_different_entities_all_succeed",
        concurrent_inserts_different_entities_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_distinct_versions_all_visible",
        concurrent_distinct_versions_all_visible(factory).await,
    ));

    results
}

// ── Same version: exactly one wins ──────────────────────────────────────────

/// N tasks race to insert version 1 for the same entity. Exactly one insert
/// succeeds; the rest must get DuplicateVersion.
async fn concurrent_insert_same_version_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let key = post_key("post-1");

    let mut handles = Vec::new();
    for _i in 0..N {
        let s = store.clone();
        let k = key.clone();
        handles.push(tokio::spawn(async move {
            match s.insert(make_record(&k, 1, true)).await {
                Ok(()) => Ok(true),                                     // won
                Err(StorageError::DuplicateVersion { .. }) => Ok(false), // lost
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    Ok(())
}

// ── Different entities: all succeed ─────────────────────────────────────────

/// N tasks each insert version 1 for a different entity. No false conflicts.
async fn concurrent_inserts_different_entities_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.insert(make_record(&post_key(&format!("post-{i}")), 1, true))
                .await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("insert failed without contention: {e}"))?;
    }

    for i in 0..N {
        let max = store
            .max_version(&post_key(&format!("post-{i}")))
            .await
            .map_err(|e| format!("max: {e}"))?;
        if max != 1 {
            return Err(format!("post-{i}: expected max 1, got {max}"));
        }
    }
    Ok(())
}

// ── Distinct versions for one entity: all visible ───────────────────────────

async fn concurrent_distinct_versions_all_visible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    let key = post_key("post-1");

    let mut handles = Vec::new();
    for version in 1..=N as u64 {
        let s = store.clone();
        let k = key.clone();
        handles.push(tokio::spawn(async move {
            s.insert(make_record(&k, version, version == 1)).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("insert: {e}"))?;
    }

    let versions: Vec<u64> = store
        .all_for_entity(&key)
        .await
        .map_err(|e| format!("all: {e}"))?
        .iter()
        .map(|r| r.version)
        .collect();
    if versions != (1..=N as u64).collect::<Vec<_>>() {
        return Err(format!("expected 1..={N} in order, got {versions:?}"));
    }
    Ok(())
}
