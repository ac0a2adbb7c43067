//! Conformance test suite for `VersionStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `VersionStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Insert**: append semantics, duplicate and zero-version rejection
//! - **Query**: max/min aggregates, point lookups, range and full scans in version order
//! - **Delete**: bulk removal scoped to one entity
//! - **Concurrency**: racing inserts of the same version, parallel writers on distinct entities
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use rewind_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod delete;
mod insert;
mod query;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use crate::record::{AttributeMap, EntityKey, VersionRecord};
use crate::VersionStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "insert", "query", "delete").
    pub category: String,
    /// Test name (e.g. "duplicate_version_rejected").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(insert::run_insert_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
    results.extend(delete::run_delete_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn post_key(id: &str) -> EntityKey {
    EntityKey::new("Post", id)
}

fn title(value: String) -> AttributeMap {
    BTreeMap::from([("title".to_string(), serde_json::Value::String(value))])
}

fn make_record(key: &EntityKey, version: u64, is_snapshot: bool) -> VersionRecord {
    VersionRecord {
        entity_type: key.entity_type.clone(),
        entity_id: key.entity_id.clone(),
        version,
        old_values: title(format!("title-{}", version.saturating_sub(1))),
        new_values: title(format!("title-{version}")),
        is_snapshot,
        actor_id: Some("test-actor".to_string()),
        created_at: "2025-01-01T00:00:00Z".to_string(),
    }
}

/// Insert versions `1..=count`, snapshots at 1 and every multiple of 10.
async fn seed<S: VersionStore>(store: &S, key: &EntityKey, count: u64) -> Result<(), String> {
    for version in 1..=count {
        let is_snapshot = version == 1 || version % 10 == 0;
        store
            .insert(make_record(key, version, is_snapshot))
            .await
            .map_err(|e| format!("seed v{version}: {e}"))?;
    }
    Ok(())
}
