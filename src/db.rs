use crate::error::{Result, SubscriptionError};
use crate::store::{Document, DocumentStore, ListenerRegistration, SnapshotListener, StoreEvent};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode so the importer can write while a browser polls
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Documents Table (one row per document, payload kept as JSON)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, doc_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_updated ON documents(collection, updated_at)",
        [],
    )?;

    Ok(())
}

/// Open (creating if needed) a store database at `path`.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Insert or overwrite documents. Returns how many rows were written.
pub fn upsert_documents(conn: &Connection, collection: &str, documents: &[Document]) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;
    let mut written = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO documents (collection, doc_id, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, doc_id)
             DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
        )?;
        for doc in documents {
            let payload = serde_json::to_string(&doc.fields)?;
            written += stmt.execute(params![collection, doc.id, payload, now])?;
        }
    }
    tx.commit()?;

    debug!(collection, written, "documents upserted");
    Ok(written)
}

/// Every document of `collection`, ordered by id.
pub fn load_collection(conn: &Connection, collection: &str) -> Result<Vec<Document>> {
    let mut stmt = conn.prepare(
        "SELECT doc_id, payload
         FROM documents
         WHERE collection = ?1
         ORDER BY doc_id",
    )?;

    let rows = stmt
        .query_map([collection], |row| {
            let id: String = row.get(0)?;
            let payload: String = row.get(1)?;
            Ok((id, payload))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, payload)| {
            let fields: Map<String, Value> = serde_json::from_str(&payload)?;
            Ok(Document::new(id, fields))
        })
        .collect()
}

pub fn get_document(conn: &Connection, collection: &str, id: &str) -> Result<Option<Document>> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM documents WHERE collection = ?1 AND doc_id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;

    match payload {
        Some(payload) => Ok(Some(Document::new(id, serde_json::from_str(&payload)?))),
        None => Ok(None),
    }
}

pub fn count_documents(conn: &Connection, collection: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE collection = ?1",
        [collection],
        |row| row.get(0),
    )?;

    Ok(count)
}

/// Remove every document of `collection`. Returns the number removed.
pub fn clear_collection(conn: &Connection, collection: &str) -> Result<usize> {
    let removed = conn.execute("DELETE FROM documents WHERE collection = ?1", [collection])?;
    info!(collection, removed, "collection cleared");
    Ok(removed)
}

pub fn delete_document(conn: &Connection, collection: &str, id: &str) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2",
        params![collection, id],
    )?;
    Ok(removed > 0)
}

/// SHA-256 over a snapshot's ids and payloads, hex encoded.
pub fn snapshot_digest(documents: &[Document]) -> Result<String> {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_vec(&doc.fields)?);
        hasher.update([0u8]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// POLLING STORE
// ============================================================================

/// What a watch was last told.
#[derive(Debug, Clone, PartialEq)]
enum Delivered {
    Snapshot(String),
    Failed,
}

struct Watch {
    collection: String,
    listener: SnapshotListener,
    last: Option<Delivered>,
}

#[derive(Default)]
struct Watches {
    next_id: u64,
    entries: BTreeMap<u64, Watch>,
}

struct SqliteInner {
    conn: Mutex<Connection>,
    watches: Mutex<Watches>,
}

impl SqliteInner {
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn watches(&self) -> MutexGuard<'_, Watches> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, collection: &str) -> Result<(Vec<Document>, String)> {
        let documents = load_collection(&self.conn(), collection)?;
        let digest = snapshot_digest(&documents)?;
        Ok((documents, digest))
    }
}

/// SqliteStore - Document store backed by a SQLite file
///
/// SQLite has no change feed, so listeners are served by polling: each
/// [`SqliteStore::poll`] reloads the watched collections and notifies only
/// the listeners whose last delivery differs from the current digest.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<SqliteInner>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Self {
            inner: Arc::new(SqliteInner {
                conn: Mutex::new(conn),
                watches: Mutex::new(Watches::default()),
            }),
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "opening document store");
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize> {
        upsert_documents(&self.inner.conn(), collection, documents)
    }

    pub fn clear(&self, collection: &str) -> Result<usize> {
        clear_collection(&self.inner.conn(), collection)
    }

    pub fn count(&self, collection: &str) -> Result<i64> {
        count_documents(&self.inner.conn(), collection)
    }

    pub fn watch_count(&self) -> usize {
        self.inner.watches().entries.len()
    }

    /// Reload watched collections and notify listeners that are behind.
    /// Returns the number of notifications delivered.
    pub fn poll(&self) -> usize {
        let collections: BTreeSet<String> = self
            .inner
            .watches()
            .entries
            .values()
            .map(|w| w.collection.clone())
            .collect();

        let mut outbox: Vec<(SnapshotListener, StoreEvent)> = Vec::new();

        for collection in collections {
            let loaded = self.inner.load(&collection);
            let mut watches = self.inner.watches();
            let targets = watches
                .entries
                .values_mut()
                .filter(|w| w.collection == collection);

            match &loaded {
                Ok((documents, digest)) => {
                    let current = Delivered::Snapshot(digest.clone());
                    for watch in targets {
                        if watch.last.as_ref() != Some(&current) {
                            watch.last = Some(current.clone());
                            outbox.push((watch.listener.clone(), StoreEvent::Snapshot(documents.clone())));
                        }
                    }
                }
                Err(err) => {
                    warn!(collection = %collection, error = %err, "polling collection failed");
                    let event = StoreEvent::Error(SubscriptionError::Transport(err.to_string()));
                    for watch in targets {
                        if watch.last != Some(Delivered::Failed) {
                            watch.last = Some(Delivered::Failed);
                            outbox.push((watch.listener.clone(), event.clone()));
                        }
                    }
                }
            }
        }

        let delivered = outbox.len();
        for (listener, event) in outbox {
            listener(event);
        }
        if delivered > 0 {
            debug!(delivered, "poll delivered notifications");
        }
        delivered
    }
}

impl DocumentStore for SqliteStore {
    fn listen(&self, collection: &str, listener: SnapshotListener) -> ListenerRegistration {
        let (event, last) = match self.inner.load(collection) {
            Ok((documents, digest)) => (StoreEvent::Snapshot(documents), Delivered::Snapshot(digest)),
            Err(err) => {
                warn!(collection, error = %err, "initial load failed");
                (
                    StoreEvent::Error(SubscriptionError::from(err)),
                    Delivered::Failed,
                )
            }
        };

        let id = {
            let mut watches = self.inner.watches();
            let id = watches.next_id;
            watches.next_id += 1;
            watches.entries.insert(
                id,
                Watch {
                    collection: collection.to_string(),
                    listener: listener.clone(),
                    last: Some(last),
                },
            );
            id
        };
        debug!(collection, watch = id, "watch registered");

        listener(event);

        let inner = Arc::downgrade(&self.inner);
        ListenerRegistration::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.watches().entries.remove(&id);
                debug!(watch = id, "watch removed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document::from_value(id, value)
    }

    fn recorder() -> (SnapshotListener, Arc<Mutex<Vec<StoreEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener: SnapshotListener = Arc::new(move |event| sink.lock().unwrap().push(event));
        (listener, events)
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let docs = vec![
            doc("Dolo 650", json!({"Product Name": "Dolo 650", "M.R.P.": 30.5})),
            doc("Crocin", json!({"Product Name": "Crocin"})),
        ];

        upsert_documents(&conn, "medicine-1", &docs).unwrap();
        upsert_documents(&conn, "medicine-1", &docs).unwrap();

        assert_eq!(count_documents(&conn, "medicine-1").unwrap(), 2);
        assert_eq!(count_documents(&conn, "medicine-2").unwrap(), 0);
    }

    #[test]
    fn test_load_collection_ordered_by_id() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        upsert_documents(
            &conn,
            "medicine-2",
            &[doc("D2", json!({"Drug Name": "B"})), doc("D1", json!({"Drug Name": "A"}))],
        )
        .unwrap();

        let docs = load_collection(&conn, "medicine-2").unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["D1", "D2"]);
        assert_eq!(docs[0].fields.get("Drug Name"), Some(&json!("A")));
    }

    #[test]
    fn test_get_and_delete_document() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        upsert_documents(&conn, "medicine-1", &[doc("a", json!({"Qty": "3"}))]).unwrap();

        let found = get_document(&conn, "medicine-1", "a").unwrap();
        assert_eq!(found, Some(doc("a", json!({"Qty": "3"}))));

        assert!(delete_document(&conn, "medicine-1", "a").unwrap());
        assert!(!delete_document(&conn, "medicine-1", "a").unwrap());
        assert_eq!(get_document(&conn, "medicine-1", "a").unwrap(), None);
    }

    #[test]
    fn test_clear_collection_leaves_others() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        upsert_documents(&conn, "medicine-1", &[doc("a", json!({}))]).unwrap();
        upsert_documents(&conn, "medicine-2", &[doc("b", json!({}))]).unwrap();

        assert_eq!(clear_collection(&conn, "medicine-1").unwrap(), 1);
        assert_eq!(count_documents(&conn, "medicine-1").unwrap(), 0);
        assert_eq!(count_documents(&conn, "medicine-2").unwrap(), 1);
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = vec![doc("a", json!({"Qty": "1"}))];
        let b = vec![doc("a", json!({"Qty": "2"}))];

        let digest = snapshot_digest(&a).unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, snapshot_digest(&a.clone()).unwrap());
        assert_ne!(digest, snapshot_digest(&b).unwrap());
    }

    #[test]
    fn test_poll_only_notifies_on_change() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert("medicine-1", &[doc("a", json!({"Product Name": "A"}))])
            .unwrap();

        let (listener, events) = recorder();
        let _reg = store.listen("medicine-1", listener);
        assert_eq!(events.lock().unwrap().len(), 1);

        assert_eq!(store.poll(), 0);

        store
            .upsert("medicine-1", &[doc("b", json!({"Product Name": "B"}))])
            .unwrap();
        assert_eq!(store.poll(), 1);
        assert_eq!(store.poll(), 0);

        let events = events.lock().unwrap();
        match &events[1] {
            StoreEvent::Snapshot(docs) => assert_eq!(docs.len(), 2),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_removed_watch_is_not_polled() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (listener, events) = recorder();
        let reg = store.listen("medicine-2", listener);
        assert_eq!(store.watch_count(), 1);

        reg.remove();
        assert_eq!(store.watch_count(), 0);

        store.upsert("medicine-2", &[doc("D1", json!({}))]).unwrap();
        assert_eq!(store.poll(), 0);
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_poll_sees_writes_from_another_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medsync.db");

        let store = SqliteStore::open(&path).unwrap();
        let (listener, events) = recorder();
        let _reg = store.listen("medicine-1", listener);

        let writer = open_database(&path).unwrap();
        upsert_documents(&writer, "medicine-1", &[doc("x", json!({"Product Name": "X"}))]).unwrap();

        assert_eq!(store.poll(), 1);
        let events = events.lock().unwrap();
        assert_eq!(
            events.last(),
            Some(&StoreEvent::Snapshot(vec![doc("x", json!({"Product Name": "X"}))]))
        );
    }
}
