//! State reconstruction.
//!
//! Materializes an entity's tracked attributes at a target version by
//! replaying diffs according to a [`Plan`]. Pure: reads the loaded history
//! and the entity's present attributes, writes nothing.

use rewind_storage::AttributeMap;

use crate::entity::AttributePolicy;
use crate::history::{merge, History};
use crate::planner::{Method, Plan};

/// Build the attribute map for `target`.
///
/// `present` is the entity's current attribute state, used as the base for
/// `Method::Direct` and returned as-is (minus exclusions) for `Method::None`.
/// Excluded attributes never appear in the result.
pub fn build_attributes(
    present: &AttributeMap,
    history: &History,
    policy: &AttributePolicy,
    plan: &Plan,
    current: u64,
    target: u64,
) -> AttributeMap {
    let state = match (plan.method, plan.pivot.and_then(|v| history.get(v))) {
        (Method::None, _) => policy.strip_excluded(present),
        (Method::FromSnapshot, Some(snapshot)) => replay(
            policy.strip_excluded(&snapshot.new_values),
            history,
            snapshot.version,
            target,
        ),
        // A pivot missing from `history` degrades to direct replay.
        (Method::Direct, _) | (Method::FromSnapshot, None) => {
            replay(policy.strip_excluded(present), history, current, target)
        }
    };
    policy.strip_excluded(&state)
}

/// Walk from `from` to `to`, merging `old_values` when moving backward and
/// `new_values` when moving forward. Versions with no record are skipped.
pub fn replay(mut state: AttributeMap, history: &History, from: u64, to: u64) -> AttributeMap {
    if to < from {
        for record in history.between(to + 1, from).rev() {
            merge(&mut state, &record.old_values);
        }
    } else {
        for record in history.between(from + 1, to) {
            merge(&mut state, &record.new_values);
        }
    }
    state
}
