// Document Store - The seam to the realtime database
// A store holds named collections of JSON documents keyed by a
// store-assigned id and pushes the full contents of a collection to every
// listener whenever it changes.

use crate::error::SubscriptionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// One stored document: identity plus arbitrary field payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build from a JSON object value; anything else yields an empty payload.
    pub fn from_value(id: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, fields)
    }
}

/// Notification delivered to a listener.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Full current contents of the collection, in store order.
    Snapshot(Vec<Document>),
    /// The notification channel failed.
    Error(SubscriptionError),
}

pub type SnapshotListener = Arc<dyn Fn(StoreEvent) + Send + Sync>;

/// A realtime document database.
pub trait DocumentStore: Send + Sync {
    /// Start delivering notifications for `collection` to `listener`.
    ///
    /// Implementations may deliver the initial snapshot before returning.
    fn listen(&self, collection: &str, listener: SnapshotListener) -> ListenerRegistration;
}

/// Handle returned by [`DocumentStore::listen`].
///
/// Removing it (explicitly or by dropping) detaches the listener.
pub struct ListenerRegistration {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    pub fn new<F>(remove: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Registration with nothing to detach.
    pub fn noop() -> Self {
        Self { remove: None }
    }

    pub fn remove(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Default)]
struct MemoryInner {
    collections: HashMap<String, BTreeMap<String, Map<String, Value>>>,
    listeners: BTreeMap<u64, (String, SnapshotListener)>,
    next_id: u64,
}

impl MemoryInner {
    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn listeners_for(&self, collection: &str) -> Vec<SnapshotListener> {
        self.listeners
            .values()
            .filter(|(c, _)| c == collection)
            .map(|(_, l)| l.clone())
            .collect()
    }
}

/// MemoryStore - Realtime store held in process memory
///
/// Documents are ordered by id. Every mutation pushes a fresh snapshot to
/// the collection's listeners synchronously.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite one document.
    pub fn set_document(&self, collection: &str, id: &str, fields: Value) {
        {
            let mut inner = self.lock();
            let fields = Document::from_value(id, fields).fields;
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields);
        }
        self.notify(collection);
    }

    pub fn delete_document(&self, collection: &str, id: &str) -> bool {
        let removed = {
            let mut inner = self.lock();
            inner
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.remove(id))
                .is_some()
        };
        if removed {
            self.notify(collection);
        }
        removed
    }

    /// Replace a whole collection in one notification.
    pub fn replace_collection(&self, collection: &str, documents: Vec<Document>) {
        {
            let mut inner = self.lock();
            let docs = documents
                .into_iter()
                .map(|d| (d.id, d.fields))
                .collect();
            inner.collections.insert(collection.to_string(), docs);
        }
        self.notify(collection);
    }

    /// Push a channel error to every listener of `collection`.
    pub fn fail(&self, collection: &str, error: SubscriptionError) {
        let listeners = self.lock().listeners_for(collection);
        debug!(collection, %error, listeners = listeners.len(), "failing listeners");
        for listener in listeners {
            listener(StoreEvent::Error(error.clone()));
        }
    }

    pub fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.lock().snapshot(collection)
    }

    pub fn listener_count(&self, collection: &str) -> usize {
        self.lock().listeners_for(collection).len()
    }

    fn notify(&self, collection: &str) {
        let (listeners, snapshot) = {
            let inner = self.lock();
            (inner.listeners_for(collection), inner.snapshot(collection))
        };
        for listener in listeners {
            listener(StoreEvent::Snapshot(snapshot.clone()));
        }
    }
}

impl DocumentStore for MemoryStore {
    fn listen(&self, collection: &str, listener: SnapshotListener) -> ListenerRegistration {
        let (id, snapshot) = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner
                .listeners
                .insert(id, (collection.to_string(), listener.clone()));
            (id, inner.snapshot(collection))
        };
        debug!(collection, listener = id, "listener attached");

        listener(StoreEvent::Snapshot(snapshot));

        let inner = Arc::downgrade(&self.inner);
        ListenerRegistration::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listeners
                    .remove(&id);
                debug!(listener = id, "listener detached");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recording_listener() -> (SnapshotListener, Arc<Mutex<Vec<StoreEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener: SnapshotListener = Arc::new(move |event| sink.lock().unwrap().push(event));
        (listener, events)
    }

    #[test]
    fn test_listen_delivers_initial_snapshot() {
        let store = MemoryStore::new();
        store.set_document("medicine-1", "b", json!({"Product Name": "B"}));
        store.set_document("medicine-1", "a", json!({"Product Name": "A"}));

        let (listener, events) = recording_listener();
        let _reg = store.listen("medicine-1", listener);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            StoreEvent::Snapshot(docs) => {
                let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
                assert_eq!(ids, vec!["a", "b"]);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_mutations_push_full_snapshots() {
        let store = MemoryStore::new();
        let (listener, events) = recording_listener();
        let _reg = store.listen("medicine-2", listener);

        store.set_document("medicine-2", "D1", json!({"Drug Name": "X"}));
        store.set_document("medicine-2", "D2", json!({"Drug Name": "Y"}));
        assert!(store.delete_document("medicine-2", "D1"));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[3],
            StoreEvent::Snapshot(vec![Document::from_value("D2", json!({"Drug Name": "Y"}))])
        );
    }

    #[test]
    fn test_other_collections_not_notified() {
        let store = MemoryStore::new();
        let (listener, events) = recording_listener();
        let _reg = store.listen("medicine-1", listener);

        store.set_document("medicine-2", "D1", json!({}));
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dropping_registration_detaches() {
        let store = MemoryStore::new();
        let (listener, events) = recording_listener();
        let reg = store.listen("medicine-1", listener);
        assert_eq!(store.listener_count("medicine-1"), 1);

        drop(reg);
        assert_eq!(store.listener_count("medicine-1"), 0);

        store.set_document("medicine-1", "x", json!({}));
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_fail_reaches_listeners() {
        let store = MemoryStore::new();
        let (listener, events) = recording_listener();
        let _reg = store.listen("medicine-1", listener);

        let err = SubscriptionError::PermissionDenied("rules".into());
        store.fail("medicine-1", err.clone());

        assert_eq!(events.lock().unwrap().last(), Some(&StoreEvent::Error(err)));
    }
}
