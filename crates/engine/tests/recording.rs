//! Version recording through the lifecycle hooks.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::{default_engine, engine, map, post, table, Post};
use rewind_engine::{
    Entity, FixedActor, LocalLocks, LockProvider, RewindConfig, VersionEvent, Versioning,
};
use serde_json::json;

// ──────────────────────────────────────────────
// Creation and updates
// ──────────────────────────────────────────────

#[tokio::test]
async fn create_records_a_first_snapshot() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");

    let v1 = p.save(&rewind).await.unwrap();

    assert_eq!(v1.version, 1);
    assert!(v1.is_snapshot);
    assert_eq!(v1.new_values, map(json!({"title": "A", "body": "B"})));
    assert_eq!(v1.old_values, map(json!({"title": null, "body": null})));
    assert_eq!(p.pointer(), Some(1));
    assert_eq!(p.row()["current_version"], json!(1));
}

#[tokio::test]
async fn update_records_only_the_changed_attributes() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;

    p.set("title", json!("C"));
    let v2 = p.save(&rewind).await.unwrap();

    assert_eq!(v2.version, 2);
    assert!(!v2.is_snapshot);
    assert_eq!(v2.old_values, map(json!({"title": "A"})));
    assert_eq!(v2.new_values, map(json!({"title": "C"})));
    assert_eq!(p.pointer(), Some(2));
}

#[tokio::test]
async fn save_without_changes_records_nothing() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;

    assert!(p.save(&rewind).await.is_none());
    p.set("title", json!("A"));
    assert!(p.save(&rewind).await.is_none());
    assert_eq!(rewind.history(&p).await.unwrap().len(), 1);
}

#[tokio::test]
async fn end_to_end_branch_from_an_undone_version() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;
    p.set("title", json!("C"));
    p.save(&rewind).await;

    assert!(rewind.undo(&mut p).await.unwrap());
    assert_eq!(p.get("title"), json!("A"));
    assert_eq!(p.pointer(), Some(1));

    p.set("title", json!("D"));
    let v3 = p.save(&rewind).await.unwrap();

    assert_eq!(v3.version, 3);
    assert!(v3.is_snapshot, "writes from a rewound position are snapshots");
    assert_eq!(v3.old_values, map(json!({"title": "C", "body": "B"})));
    assert_eq!(v3.new_values, map(json!({"title": "D", "body": "B"})));
    assert_eq!(p.pointer(), Some(3));
}

#[tokio::test]
async fn branch_old_values_describe_the_former_head_not_the_rewound_state() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;
    p.set("title", json!("C"));
    p.save(&rewind).await;
    p.set("body", json!("E"));
    p.save(&rewind).await;

    rewind.go_to(&mut p, 1).await.unwrap();
    assert_eq!(p.get("body"), json!("B"));

    p.set("title", json!("Z"));
    let v4 = p.save(&rewind).await.unwrap();

    assert!(v4.is_snapshot);
    assert_eq!(v4.old_values, map(json!({"title": "C", "body": "E"})));
    assert_eq!(v4.new_values, map(json!({"title": "Z", "body": "B"})));
}

#[tokio::test]
async fn snapshot_every_interval() {
    let rewind = engine(RewindConfig {
        snapshot_interval: 3,
        ..RewindConfig::default()
    });
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;
    for i in 2..=7 {
        p.set("title", json!(format!("T{i}")));
        p.save(&rewind).await;
    }

    let history = rewind.history(&p).await.unwrap();
    let snapshots: Vec<u64> = history
        .records()
        .filter(|r| r.is_snapshot)
        .map(|r| r.version)
        .collect();
    assert_eq!(snapshots, vec![1, 3, 6]);

    let v6 = history.get(6).unwrap();
    assert_eq!(v6.new_values, map(json!({"title": "T6", "body": "B"})));
    assert_eq!(v6.old_values, map(json!({"title": "T5"})));
}

// ──────────────────────────────────────────────
// Attribute selection
// ──────────────────────────────────────────────

#[tokio::test]
async fn excluded_attribute_alone_records_nothing() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B")
        .with_versioning(Versioning::all().excluding(["view_count"]));
    p.set("view_count", json!(0));
    p.save(&rewind).await;

    p.set("view_count", json!(1));
    assert!(p.save(&rewind).await.is_none());

    p.set("updated_at", json!("2025-06-01T00:00:00Z"));
    assert!(p.save(&rewind).await.is_none());

    p.set("view_count", json!(2));
    p.set("title", json!("C"));
    let v2 = p.save(&rewind).await.unwrap();
    let keys: BTreeSet<&str> = v2.new_values.keys().map(String::as_str).collect();
    assert_eq!(keys, BTreeSet::from(["title"]));
}

#[tokio::test]
async fn config_exclusions_apply_per_entity_type() {
    let mut config = RewindConfig::default();
    config
        .excluded_attributes
        .insert("Post".to_string(), vec!["body".to_string()]);
    let rewind = engine(config);
    let mut p = post(&table(), "A", "B");

    let v1 = p.save(&rewind).await.unwrap();
    assert_eq!(v1.new_values, map(json!({"title": "A"})));

    p.set("body", json!("changed"));
    assert!(p.save(&rewind).await.is_none());
}

#[tokio::test]
async fn explicit_allow_list_limits_tracking() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B").with_versioning(Versioning::only(["title"]));

    let v1 = p.save(&rewind).await.unwrap();
    assert_eq!(v1.new_values, map(json!({"title": "A"})));

    p.set("body", json!("X"));
    assert!(p.save(&rewind).await.is_none());
}

#[tokio::test]
async fn default_tracking_records_nothing_unless_enabled() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B").with_versioning(Versioning::default());

    assert!(p.save(&rewind).await.is_none());
}

#[tokio::test]
async fn default_tracking_follows_config() {
    let rewind = engine(RewindConfig {
        tracks_all_by_default: true,
        ..RewindConfig::default()
    });
    let mut p = post(&table(), "A", "B").with_versioning(Versioning::default());

    let v1 = p.save(&rewind).await.unwrap();
    assert_eq!(v1.new_values, map(json!({"title": "A", "body": "B"})));
}

// ──────────────────────────────────────────────
// Hook gating
// ──────────────────────────────────────────────

#[tokio::test]
async fn untracked_entities_are_ignored() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B").untracked();

    assert!(p.save(&rewind).await.is_none());
    assert!(rewind.store().all_for_entity(&p.entity_key()).await.unwrap().is_empty());
}

#[tokio::test]
async fn suppressed_entities_are_not_recorded() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");
    let gate = p.events().clone();

    {
        let _quiet = gate.suppress();
        assert!(p.save(&rewind).await.is_none());
    }
    p.set("title", json!("C"));
    assert!(p.save(&rewind).await.is_some());
}

// ──────────────────────────────────────────────
// Removal and initialization
// ──────────────────────────────────────────────

#[tokio::test]
async fn soft_delete_records_every_tracked_attribute() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;

    let v2 = p.soft_delete(&rewind).await.unwrap();

    assert_eq!(v2.version, 2);
    assert_eq!(
        v2.new_values,
        map(json!({"title": "A", "body": "B", "deleted_at": "2025-06-01T00:00:00Z"}))
    );
    assert_eq!(v2.old_values["deleted_at"], json!(null));
    assert_eq!(p.pointer(), Some(2));
}

#[tokio::test]
async fn hard_delete_purges_history() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;
    p.set("title", json!("C"));
    p.save(&rewind).await;
    let key = p.entity_key();

    p.hard_delete(&rewind).await;

    assert_eq!(rewind.store().max_version(&key).await.unwrap(), 0);
    assert!(p.row().is_empty());
}

#[tokio::test]
async fn hard_delete_purges_history_while_suppressed() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;
    let key = p.entity_key();
    let gate = p.events().clone();

    {
        let _quiet = gate.suppress();
        p.hard_delete(&rewind).await;
    }

    assert_eq!(rewind.store().max_version(&key).await.unwrap(), 0);
}

#[tokio::test]
async fn soft_delete_while_suppressed_records_nothing() {
    let rewind = default_engine();
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;
    let gate = p.events().clone();

    {
        let _quiet = gate.suppress();
        assert!(p.soft_delete(&rewind).await.is_none());
    }

    assert_eq!(rewind.history(&p).await.unwrap().max_version(), 1);
}

#[tokio::test]
async fn init_version_snapshots_untracked_history_once() {
    let rewind = default_engine();
    let t = table();
    let mut p = post(&t, "A", "B");
    {
        let gate = p.events().clone();
        let _quiet = gate.suppress();
        p.save(&rewind).await;
    }
    let mut p = p.reload();
    assert_eq!(p.pointer(), None);

    let v1 = rewind.init_version(&mut p).await.unwrap().unwrap();
    assert!(v1.is_snapshot);
    assert_eq!(v1.new_values, map(json!({"title": "A", "body": "B"})));
    assert_eq!(p.pointer(), Some(1));

    assert!(rewind.init_version(&mut p).await.unwrap().is_none());
}

// ──────────────────────────────────────────────
// Actor, notifications
// ──────────────────────────────────────────────

#[tokio::test]
async fn actor_is_attributed_when_tracking_is_on() {
    let rewind = default_engine().with_actor(Arc::new(FixedActor("alice".to_string())));
    let mut p = post(&table(), "A", "B");

    let v1 = p.save(&rewind).await.unwrap();
    assert_eq!(v1.actor_id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn actor_is_omitted_when_tracking_is_off() {
    let rewind = engine(RewindConfig {
        track_actor: false,
        ..RewindConfig::default()
    })
    .with_actor(Arc::new(FixedActor("alice".to_string())));
    let mut p = post(&table(), "A", "B");

    let v1 = p.save(&rewind).await.unwrap();
    assert_eq!(v1.actor_id, None);
}

#[tokio::test]
async fn subscribers_see_created_versions() {
    let rewind = default_engine();
    let mut events = rewind.subscribe();
    let mut p = post(&table(), "A", "B");

    p.save(&rewind).await;
    p.set("title", json!("C"));
    p.save(&rewind).await;

    assert_eq!(
        events.recv().await.unwrap(),
        VersionEvent::Created {
            key: p.entity_key(),
            version: 1,
            is_snapshot: true,
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        VersionEvent::Created {
            key: p.entity_key(),
            version: 2,
            is_snapshot: false,
        }
    );
}

#[tokio::test]
async fn created_at_is_an_rfc3339_utc_timestamp() {
    let rewind = default_engine();
    let v1 = post(&table(), "A", "B").save(&rewind).await.unwrap();
    let parsed = time::OffsetDateTime::parse(
        &v1.created_at,
        &time::format_description::well_known::Rfc3339,
    )
    .unwrap();
    assert_eq!(parsed.offset(), time::UtcOffset::UTC);
}

// ──────────────────────────────────────────────
// Locking
// ──────────────────────────────────────────────

#[tokio::test]
async fn lock_timeout_skips_the_record_but_keeps_the_save() {
    let locks = Arc::new(LocalLocks::new());
    let rewind = engine(RewindConfig {
        lock_wait_ms: 20,
        ..RewindConfig::default()
    })
    .with_locks(locks.clone());
    let mut p = post(&table(), "A", "B");
    p.save(&rewind).await;

    let held = locks
        .acquire(&p.entity_key(), Duration::from_millis(20))
        .await
        .unwrap();
    p.set("title", json!("C"));
    assert!(p.save(&rewind).await.is_none());
    assert_eq!(p.row()["title"], json!("C"));
    drop(held);

    assert_eq!(rewind.history(&p).await.unwrap().max_version(), 1);
}

#[tokio::test]
async fn concurrent_saves_get_distinct_versions() {
    let rewind = Arc::new(default_engine());
    let t = table();
    let mut p = post(&t, "A", "B").without_pointer();
    p.save(&rewind).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let rewind = Arc::clone(&rewind);
        let mut handle: Post = p.reload();
        handles.push(tokio::spawn(async move {
            handle.set("title", json!(format!("writer {i}")));
            handle.save(&rewind).await.map(|r| r.version)
        }));
    }

    let mut versions = Vec::new();
    for handle in handles {
        versions.push(handle.await.unwrap().unwrap());
    }
    versions.sort_unstable();
    assert_eq!(versions, (2..=11).collect::<Vec<u64>>());
}
