//! # al-store-memory
//!
//! In-process implementation of `DocumentStore`, `ProfileStore` and
//! `SessionStore`. Every mutation pushes a fresh, ordered full snapshot to
//! each live subscriber of the touched collection, the way a real-time
//! document store fans out changes.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use al_core::traits::{Document, DocumentStore, OrderBy, ProfileStore, SessionStore, SnapshotStream, SortDirection};
use al_core::UserProfile;
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

struct Subscriber {
    order: OrderBy,
    tx: mpsc::UnboundedSender<anyhow::Result<Vec<Document>>>,
}

#[derive(Default)]
struct Collection {
    docs: HashMap<String, Value>,
    subscribers: Vec<Subscriber>,
}

impl Collection {
    /// Sends the current contents to every subscriber and forgets the ones that hung up.
    fn publish(&mut self) {
        let docs = &self.docs;
        self.subscribers.retain(|s| s.tx.send(Ok(ordered_snapshot(docs, &s.order))).is_ok());
    }
}

/// Numbers compare numerically, strings lexically; missing fields sort first.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn ordered_snapshot(docs: &HashMap<String, Value>, order: &OrderBy) -> Vec<Document> {
    let mut snapshot: Vec<Document> = docs
        .iter()
        .map(|(id, data)| Document { id: id.clone(), data: data.clone() })
        .collect();
    snapshot.sort_by(|a, b| {
        let by_field = compare_field(a.data.get(&order.field), b.data.get(&order.field));
        let by_field = match order.direction {
            SortDirection::Ascending => by_field,
            SortDirection::Descending => by_field.reverse(),
        };
        by_field.then_with(|| a.id.cmp(&b.id))
    });
    snapshot
}

/// Writes `value` at `path` inside `doc`, creating intermediate objects. `None` removes the leaf.
fn write_path(doc: &mut Value, path: &[String], value: Option<Value>) -> anyhow::Result<()> {
    let Some((leaf, parents)) = path.split_last() else {
        bail!("empty field path");
    };
    let mut cursor = doc;
    for key in parents {
        let object = cursor.as_object_mut().ok_or_else(|| anyhow!("field {key} is not inside an object"))?;
        cursor = object.entry(key.clone()).or_insert_with(|| Value::Object(Map::new()));
    }
    let object = cursor.as_object_mut().ok_or_else(|| anyhow!("field {leaf} is not inside an object"))?;
    match value {
        Some(v) => {
            object.insert(leaf.clone(), v);
        }
        None => {
            object.remove(leaf);
        }
    }
    Ok(())
}

pub struct MemoryDocumentStore {
    collections: DashMap<String, Collection>,
    profiles_collection: String,
    /// When set, every non-subscribe operation fails with this reason.
    failure: Mutex<Option<String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_profiles_collection("users")
    }

    pub fn with_profiles_collection(name: &str) -> Self {
        Self {
            collections: DashMap::new(),
            profiles_collection: name.to_string(),
            failure: Mutex::new(None),
        }
    }

    /// Makes subsequent operations fail like an unreachable or denying backend.
    pub fn fail_with(&self, reason: &str) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(reason.to_string());
        }
    }

    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    /// Delivers a failed notification to every subscriber of `collection`.
    pub fn inject_subscription_error(&self, collection: &str, reason: &str) {
        if let Some(mut col) = self.collections.get_mut(collection) {
            col.subscribers.retain(|s| s.tx.send(Err(anyhow!(reason.to_string()))).is_ok());
        }
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        let col = self.collections.get(collection)?;
        col.docs.get(id).map(|data| Document { id: id.to_string(), data: data.clone() })
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.docs.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.subscribers.iter().filter(|s| !s.tx.is_closed()).count())
    }

    fn check_available(&self) -> anyhow::Result<()> {
        let failure = self.failure.lock().map_err(|_| anyhow!("store state poisoned"))?;
        match failure.as_deref() {
            Some(reason) => Err(anyhow!(reason.to_string())),
            None => Ok(()),
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn subscribe(&self, collection: &str, order: OrderBy) -> anyhow::Result<SnapshotStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut col = self.collections.entry(collection.to_string()).or_default();
        // Subscribers see the current contents immediately.
        tx.send(Ok(ordered_snapshot(&col.docs, &order)))
            .map_err(|_| anyhow!("subscriber dropped during subscribe"))?;
        col.subscribers.push(Subscriber { order, tx });
        debug!(collection, "subscriber added");
        Ok(rx)
    }

    async fn append(&self, collection: &str, data: Value) -> anyhow::Result<String> {
        self.check_available()?;
        let id = Uuid::new_v4().simple().to_string();
        let mut col = self.collections.entry(collection.to_string()).or_default();
        col.docs.insert(id.clone(), data);
        col.publish();
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> anyhow::Result<()> {
        self.check_available()?;
        let mut col = self.collections.entry(collection.to_string()).or_default();
        col.docs.insert(id.to_string(), data);
        col.publish();
        Ok(())
    }

    async fn update_field(
        &self,
        collection: &str,
        id: &str,
        path: &[String],
        value: Option<Value>,
    ) -> anyhow::Result<()> {
        self.check_available()?;
        let mut col = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("no document {collection}/{id}"))?;
        let doc = col.docs.get_mut(id).ok_or_else(|| anyhow!("no document {collection}/{id}"))?;
        write_path(doc, path, value)?;
        col.publish();
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<()> {
        self.check_available()?;
        if let Some(mut col) = self.collections.get_mut(collection) {
            if col.docs.remove(id).is_some() {
                col.publish();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryDocumentStore {
    async fn get_profile(&self, uid: &str) -> anyhow::Result<Option<UserProfile>> {
        self.check_available()?;
        match self.get(&self.profiles_collection, uid) {
            Some(doc) => Ok(Some(serde_json::from_value(doc.data)?)),
            None => Ok(None),
        }
    }

    async fn create_profile(&self, profile: UserProfile) -> anyhow::Result<()> {
        let data = serde_json::to_value(&profile)?;
        self.set(&self.profiles_collection, &profile.uid, data).await
    }
}

/// Session key-value pairs held for the life of the process.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
