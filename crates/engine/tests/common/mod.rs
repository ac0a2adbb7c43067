//! In-memory host entity used by the engine integration tests.
//!
//! `Post` behaves like an ORM record: it tracks a dirty set with original
//! values, persists into a shared table, and drives the lifecycle hooks the
//! way a host persistence layer would.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rewind_engine::{
    AttributeMap, Entity, EntityKey, EventGate, MemoryStore, Removal, Rewind, RewindConfig,
    RewindError, VersionRecord, Versioning,
};
use serde_json::{json, Value};

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

/// Persisted rows by id.
pub type Table = Arc<Mutex<BTreeMap<String, AttributeMap>>>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn table() -> Table {
    Arc::new(Mutex::new(BTreeMap::new()))
}

pub fn engine(config: RewindConfig) -> Rewind {
    Rewind::new(Arc::new(MemoryStore::new()), config).unwrap()
}

pub fn default_engine() -> Rewind {
    engine(RewindConfig::default())
}

/// Attribute map from JSON object literal.
pub fn map(value: Value) -> AttributeMap {
    serde_json::from_value(value).unwrap()
}

/// A new, unsaved post with `title` and `body`.
pub fn post(table: &Table, title: &str, body: &str) -> Post {
    let mut post = Post::blank(table.clone());
    post.set("title", json!(title));
    post.set("body", json!(body));
    post
}

// ──────────────────────────────────────────────
// Post
// ──────────────────────────────────────────────

#[derive(Debug)]
pub struct Post {
    id: String,
    attributes: AttributeMap,
    originals: AttributeMap,
    dirty: BTreeSet<String>,
    persisted: bool,
    created: bool,
    removed: bool,
    pointer_column: bool,
    pointer: Option<u64>,
    versioning: Option<Versioning>,
    gate: EventGate,
    table: Table,
    /// Number of completed `persist` calls on this handle.
    pub persists: usize,
}

impl Post {
    pub fn blank(table: Table) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::SeqCst).to_string();
        Self {
            attributes: BTreeMap::from([("id".to_string(), json!(id))]),
            id,
            originals: AttributeMap::new(),
            dirty: BTreeSet::new(),
            persisted: false,
            created: false,
            removed: false,
            pointer_column: true,
            pointer: None,
            versioning: Some(Versioning::all()),
            gate: EventGate::new(),
            table,
            persists: 0,
        }
    }

    /// A second handle on the persisted row `self`, as another request would load it.
    pub fn reload(&self) -> Self {
        let row = self
            .table
            .lock()
            .unwrap()
            .get(&self.id)
            .cloned()
            .unwrap_or_default();
        let pointer = row.get("current_version").and_then(Value::as_u64);
        let mut attributes = row;
        attributes.remove("current_version");
        Self {
            id: self.id.clone(),
            attributes,
            originals: AttributeMap::new(),
            dirty: BTreeSet::new(),
            persisted: true,
            created: false,
            removed: false,
            pointer_column: self.pointer_column,
            pointer,
            versioning: self.versioning.clone(),
            gate: EventGate::new(),
            table: self.table.clone(),
            persists: 0,
        }
    }

    pub fn without_pointer(mut self) -> Self {
        self.pointer_column = false;
        self
    }

    pub fn untracked(mut self) -> Self {
        self.versioning = None;
        self
    }

    pub fn with_versioning(mut self, versioning: Versioning) -> Self {
        self.versioning = Some(versioning);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, name: &str) -> Value {
        self.attributes.get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn pointer(&self) -> Option<u64> {
        self.pointer
    }

    /// The persisted row, including the pointer column.
    pub fn row(&self) -> AttributeMap {
        self.table
            .lock()
            .unwrap()
            .get(&self.id)
            .cloned()
            .unwrap_or_default()
    }

    /// Change an attribute, remembering its value from before the mutation.
    pub fn set(&mut self, name: &str, value: Value) {
        if self.attributes.get(name) == Some(&value) {
            return;
        }
        if !self.dirty.contains(name) {
            if let Some(original) = self.attributes.get(name) {
                self.originals.insert(name.to_string(), original.clone());
            }
            self.dirty.insert(name.to_string());
        }
        self.attributes.insert(name.to_string(), value);
    }

    /// Persist, run the save hook, end the mutation.
    pub async fn save(&mut self, rewind: &Rewind) -> Option<VersionRecord> {
        self.persist().await.unwrap();
        let record = rewind.after_save(self).await;
        self.clear_changes();
        record
    }

    /// Set the deletion marker and run the soft removal hook.
    pub async fn soft_delete(&mut self, rewind: &Rewind) -> Option<VersionRecord> {
        self.set("deleted_at", json!("2025-06-01T00:00:00Z"));
        self.persist().await.unwrap();
        let record = rewind.after_remove(self, Removal::Soft).await;
        self.clear_changes();
        record
    }

    pub async fn hard_delete(&mut self, rewind: &Rewind) {
        self.table.lock().unwrap().remove(&self.id);
        self.removed = true;
        rewind.after_remove(self, Removal::Hard).await;
    }
}

#[async_trait]
impl Entity for Post {
    fn entity_key(&self) -> EntityKey {
        EntityKey::new("Post", self.id.clone())
    }

    fn versioning(&self) -> Option<Versioning> {
        self.versioning.clone()
    }

    fn attributes(&self) -> AttributeMap {
        let mut attributes = self.attributes.clone();
        if self.pointer_column {
            attributes.insert("current_version".to_string(), json!(self.pointer));
        }
        attributes
    }

    fn original_value(&self, name: &str) -> Option<Value> {
        if self.dirty.contains(name) {
            self.originals.get(name).cloned()
        } else {
            self.attributes.get(name).cloned()
        }
    }

    fn changed_attributes(&self) -> BTreeSet<String> {
        self.dirty.clone()
    }

    fn was_created(&self) -> bool {
        self.created
    }

    fn exists(&self) -> bool {
        !self.removed
    }

    fn has_version_pointer(&self) -> bool {
        self.pointer_column
    }

    fn version_pointer(&self) -> Option<u64> {
        self.pointer.filter(|_| self.pointer_column)
    }

    fn set_version_pointer(&mut self, version: Option<u64>) {
        if self.pointer_column {
            self.pointer = version;
        }
    }

    fn apply_attributes(&mut self, attributes: &AttributeMap) {
        for (name, value) in attributes {
            self.set(name, value.clone());
        }
    }

    async fn persist(&mut self) -> Result<(), RewindError> {
        if self.removed {
            return Err(RewindError::Persist(format!("post {} was deleted", self.id)));
        }
        let mut row = self.attributes.clone();
        if self.pointer_column {
            row.insert("current_version".to_string(), json!(self.pointer));
        }
        self.table.lock().unwrap().insert(self.id.clone(), row);
        if !self.persisted {
            self.persisted = true;
            self.created = true;
        }
        self.persists += 1;
        Ok(())
    }

    fn clear_changes(&mut self) {
        self.originals.clear();
        self.dirty.clear();
        self.created = false;
    }

    fn events(&self) -> &EventGate {
        &self.gate
    }

    fn replicate(&self) -> Self {
        let mut copy = Post::blank(self.table.clone());
        copy.pointer_column = self.pointer_column;
        copy.versioning = self.versioning.clone();
        for (name, value) in &self.attributes {
            if name != "id" {
                copy.set(name, value.clone());
            }
        }
        copy
    }
}
