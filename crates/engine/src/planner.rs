//! Reconstruction path planning.
//!
//! Given the version summaries of one entity, a current version and a target
//! version, picks the cheapest way to materialize the target:
//!
//! 1. **Direct**: replay every diff between current and target.
//! 2. **Snapshot behind**: jump to the nearest snapshot at or below the
//!    target, replay forward.
//! 3. **Snapshot ahead**: jump to the nearest snapshot at or above the
//!    target, replay backward.
//!
//! Jumping to a snapshot costs 1; each replayed record costs 1. Ties go to
//! the earlier candidate in the order above.

use serde::Serialize;

/// What the planner needs to know about one version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionSummary {
    pub version: u64,
    pub is_snapshot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Already at the target.
    None,
    /// Replay diffs from the current state.
    Direct,
    /// Load the pivot snapshot, then replay diffs from it.
    FromSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub method: Method,
    pub cost: u64,
    /// Snapshot version to start from. Set only for `Method::FromSnapshot`.
    pub pivot: Option<u64>,
}

impl Plan {
    pub const NONE: Plan = Plan {
        method: Method::None,
        cost: 0,
        pivot: None,
    };
}

/// Choose the cheapest strategy to move from `current` to `target`.
///
/// Read-only over `versions`, which need not be sorted. The caller checks
/// that `target` exists before calling.
pub fn plan(versions: &[VersionSummary], current: u64, target: u64) -> Plan {
    if current == target {
        return Plan::NONE;
    }

    let mut best = Plan {
        method: Method::Direct,
        cost: count_between(versions, current.min(target), current.max(target)),
        pivot: None,
    };

    let behind = versions
        .iter()
        .filter(|v| v.is_snapshot && v.version <= target)
        .map(|v| v.version)
        .max();
    let ahead = versions
        .iter()
        .filter(|v| v.is_snapshot && v.version >= target)
        .map(|v| v.version)
        .min();

    let candidates = [
        behind.map(|s| (s, 1 + count_between(versions, s, target))),
        ahead.map(|s| (s, 1 + count_between(versions, target, s))),
    ];

    // Strictly lower only: the first minimum wins.
    for (pivot, cost) in candidates.into_iter().flatten() {
        if cost < best.cost {
            best = Plan {
                method: Method::FromSnapshot,
                cost,
                pivot: Some(pivot),
            };
        }
    }

    best
}

/// Records with `from < version <= to`.
fn count_between(versions: &[VersionSummary], from: u64, to: u64) -> u64 {
    if to <= from {
        return 0;
    }
    versions
        .iter()
        .filter(|v| v.version > from && v.version <= to)
        .count() as u64
}
