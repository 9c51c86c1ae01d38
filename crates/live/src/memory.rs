//! In-memory data store for tests/dev.
//!
//! Evaluates registered queries eagerly on every write, pushing full
//! snapshots the way the real transport does. Also records listener
//! lifecycle events so teardown ordering can be asserted in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::cursor::{compare_docs, compare_values};
use crate::query::{Filter, FilterOp, ResolvedQuery};
use crate::store::{
    DataStore, Document, ListenerId, SnapshotEvent, SnapshotSink, StoreError, StoreListener, WriteOp,
};

/// Listener lifecycle record, in occurrence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Subscribed(ListenerId),
    Cancelled(ListenerId),
}

struct ListenerEntry {
    id: ListenerId,
    query: ResolvedQuery,
    sink: SnapshotSink,
}

#[derive(Default)]
struct StoreState {
    /// Collection path -> (doc id -> document).
    collections: HashMap<String, BTreeMap<String, Document>>,
    listeners: Vec<ListenerEntry>,
    log: Vec<LifecycleEvent>,
    write_count: u32,
}

/// In-memory push-based store.
#[derive(Default)]
pub struct InMemoryDataStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a transport error to every listener registered on `path`.
    pub fn emit_error(&self, path: &str, err: StoreError) {
        let mut state = self.state.lock().unwrap();
        let mut dead = Vec::new();
        for entry in &state.listeners {
            if entry.query.path.as_str() == path
                && entry.sink.send(SnapshotEvent::Error(err.clone())).is_err()
            {
                dead.push(entry.id);
            }
        }
        state.listeners.retain(|entry| !dead.contains(&entry.id));
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().unwrap().listeners.len()
    }

    pub fn lifecycle_log(&self) -> Vec<LifecycleEvent> {
        self.state.lock().unwrap().log.clone()
    }

    /// Number of `write` invocations observed (including failed ones).
    pub fn write_count(&self) -> u32 {
        self.state.lock().unwrap().write_count
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    fn subscribe(&self, query: ResolvedQuery, sink: SnapshotSink) -> StoreListener {
        let id = ListenerId::new();
        let mut state = self.state.lock().unwrap();

        // Initial snapshot, then one per relevant write.
        let snapshot = evaluate(&state.collections, &query);
        let _ = sink.send(SnapshotEvent::Snapshot(snapshot));

        state.listeners.push(ListenerEntry {
            id,
            query,
            sink,
        });
        state.log.push(LifecycleEvent::Subscribed(id));

        let shared = Arc::clone(&self.state);
        StoreListener::new(id, move || {
            let mut state = shared.lock().unwrap();
            state.listeners.retain(|entry| entry.id != id);
            state.log.push(LifecycleEvent::Cancelled(id));
        })
    }

    async fn write(&self, op: WriteOp) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.write_count += 1;

        let collection_path = format!(
            "data/{}/{}",
            op.path().tenant_segment(),
            op.path().collection_segment()
        );
        let doc_id = op.path().doc_id().to_string();

        match op {
            WriteOp::Create { payload, .. } => {
                let fields = object_fields(payload)?;
                state
                    .collections
                    .entry(collection_path.clone())
                    .or_default()
                    .insert(doc_id.clone(), Document::new(doc_id, fields));
            }
            WriteOp::Update { payload, .. } => {
                let fields = object_fields(payload)?;
                let doc = state
                    .collections
                    .get_mut(&collection_path)
                    .and_then(|docs| docs.get_mut(&doc_id))
                    .ok_or(StoreError::NotFound)?;
                for (name, value) in fields {
                    doc.fields.insert(name, value);
                }
            }
            WriteOp::Delete { .. } => {
                let removed = state
                    .collections
                    .get_mut(&collection_path)
                    .and_then(|docs| docs.remove(&doc_id));
                if removed.is_none() {
                    return Err(StoreError::NotFound);
                }
            }
        }

        notify(&mut state, &collection_path);
        Ok(())
    }
}

fn object_fields(payload: Value) -> Result<serde_json::Map<String, Value>, StoreError> {
    match payload {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Unavailable(format!(
            "write payload must be an object, got {other}"
        ))),
    }
}

fn notify(state: &mut StoreState, collection_path: &str) {
    let targets: Vec<(ListenerId, ResolvedQuery)> = state
        .listeners
        .iter()
        .filter(|entry| entry.query.path.as_str() == collection_path)
        .map(|entry| (entry.id, entry.query.clone()))
        .collect();

    let mut dead = Vec::new();
    for (id, query) in targets {
        let snapshot = evaluate(&state.collections, &query);
        if let Some(entry) = state.listeners.iter().find(|entry| entry.id == id) {
            if entry.sink.send(SnapshotEvent::Snapshot(snapshot)).is_err() {
                dead.push(id);
            }
        }
    }

    // Drop any dead listeners while publishing.
    state.listeners.retain(|entry| !dead.contains(&entry.id));
}

fn evaluate(
    collections: &HashMap<String, BTreeMap<String, Document>>,
    query: &ResolvedQuery,
) -> Vec<Document> {
    let Some(docs) = collections.get(query.path.as_str()) else {
        return Vec::new();
    };

    let descriptor = &query.descriptor;
    let mut matched: Vec<Document> = docs
        .values()
        .filter(|doc| descriptor.filters().iter().all(|f| matches_filter(doc, f)))
        .cloned()
        .collect();

    matched.sort_by(|a, b| compare_docs(a, b, descriptor.sort()));

    if let Some(cursor) = descriptor.cursor() {
        matched.retain(|doc| cursor.admits(doc, descriptor.sort()));
    }

    matched.truncate(descriptor.window());
    matched
}

fn matches_filter(doc: &Document, filter: &Filter) -> bool {
    let field = doc.field(&filter.field).cloned().unwrap_or(Value::Null);
    let ordering = compare_values(&field, &filter.value);
    match filter.op {
        FilterOp::Eq => ordering.is_eq(),
        FilterOp::Lt => ordering.is_lt(),
        FilterOp::Le => ordering.is_le(),
        FilterOp::Gt => ordering.is_gt(),
        FilterOp::Ge => ordering.is_ge(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::query::{QueryDescriptor, SortDir};
    use crewbase_auth::{Authority, Role, SubscriptionStatus};
    use crewbase_core::{CollectionPath, SubjectId, TenantId};

    fn authority(tenant: &str) -> Authority {
        Authority {
            subject_id: SubjectId::new("u1").unwrap(),
            role: Role::Admin,
            tenant_id: Some(TenantId::new(tenant).unwrap()),
            subscription: SubscriptionStatus::Active,
        }
    }

    async fn seed(store: &InMemoryDataStore, tenant: &str, collection: &str, id: &str, payload: Value) {
        let path = CollectionPath::new(&TenantId::new(tenant).unwrap(), collection)
            .unwrap()
            .document(id)
            .unwrap();
        store.write(WriteOp::Create { path, payload }).await.unwrap();
    }

    fn open(
        store: &InMemoryDataStore,
        query: ResolvedQuery,
    ) -> (StoreListener, mpsc::UnboundedReceiver<SnapshotEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (store.subscribe(query, tx), rx)
    }

    fn ids(event: SnapshotEvent) -> Vec<String> {
        match event {
            SnapshotEvent::Snapshot(docs) => docs.into_iter().map(|d| d.id).collect(),
            SnapshotEvent::Error(err) => panic!("unexpected error event: {err}"),
        }
    }

    #[tokio::test]
    async fn filters_apply_in_caller_order_then_sort() {
        let store = InMemoryDataStore::new();
        seed(&store, "t1", "volunteers", "v1", json!({ "region": "north", "hours": 12 })).await;
        seed(&store, "t1", "volunteers", "v2", json!({ "region": "north", "hours": 3 })).await;
        seed(&store, "t1", "volunteers", "v3", json!({ "region": "south", "hours": 40 })).await;

        let query = QueryDescriptor::collection("volunteers")
            .filter("region", FilterOp::Eq, json!("north"))
            .filter("hours", FilterOp::Ge, json!(10))
            .order_by("hours", SortDir::Desc)
            .resolve(&authority("t1"))
            .unwrap();

        let (_listener, mut rx) = open(&store, query);
        assert_eq!(ids(rx.recv().await.unwrap()), ["v1"]);
    }

    #[tokio::test]
    async fn writes_push_fresh_snapshots_to_matching_listeners_only() {
        let store = InMemoryDataStore::new();
        let leads_t1 = QueryDescriptor::collection("leads").resolve(&authority("t1")).unwrap();
        let leads_t2 = QueryDescriptor::collection("leads").resolve(&authority("t2")).unwrap();

        let (_l1, mut rx1) = open(&store, leads_t1);
        let (_l2, mut rx2) = open(&store, leads_t2);
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();

        seed(&store, "t1", "leads", "a", json!({ "status": "open" })).await;

        assert_eq!(ids(rx1.recv().await.unwrap()), ["a"]);
        // The other tenant's listener saw nothing.
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn update_merges_and_delete_requires_existence() {
        let store = InMemoryDataStore::new();
        seed(&store, "t1", "leads", "a", json!({ "status": "open", "owner": "ana" })).await;

        let path = CollectionPath::new(&TenantId::new("t1").unwrap(), "leads")
            .unwrap()
            .document("a")
            .unwrap();
        store
            .write(WriteOp::Update {
                path: path.clone(),
                payload: json!({ "status": "won" }),
            })
            .await
            .unwrap();

        let query = QueryDescriptor::collection("leads").resolve(&authority("t1")).unwrap();
        let (_listener, mut rx) = open(&store, query);
        match rx.recv().await.unwrap() {
            SnapshotEvent::Snapshot(docs) => {
                assert_eq!(docs[0].field("status"), Some(&json!("won")));
                assert_eq!(docs[0].field("owner"), Some(&json!("ana")));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        store.write(WriteOp::Delete { path: path.clone() }).await.unwrap();
        assert_eq!(
            store.write(WriteOp::Delete { path }).await.unwrap_err(),
            StoreError::NotFound
        );
    }

    #[tokio::test]
    async fn update_of_missing_doc_is_not_found() {
        let store = InMemoryDataStore::new();
        let path = CollectionPath::new(&TenantId::new("t1").unwrap(), "leads")
            .unwrap()
            .document("ghost")
            .unwrap();

        let err = store
            .write(WriteOp::Update {
                path,
                payload: json!({ "status": "won" }),
            })
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }

    #[tokio::test]
    async fn keyset_window_returns_strictly_after_page() {
        let store = InMemoryDataStore::new();
        for (id, created) in [("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)] {
            seed(&store, "t1", "leads", id, json!({ "created_at": created })).await;
        }

        let first_page = QueryDescriptor::collection("leads")
            .order_by("created_at", SortDir::Asc)
            .page_size(2)
            .resolve(&authority("t1"))
            .unwrap();
        let (_l1, mut rx) = open(&store, first_page.clone());
        let first = match rx.recv().await.unwrap() {
            SnapshotEvent::Snapshot(docs) => docs,
            other => panic!("unexpected event: {other:?}"),
        };
        assert_eq!(first.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);

        // A concurrent insert before the cursor must not shift the next page.
        seed(&store, "t1", "leads", "a0", json!({ "created_at": 0 })).await;

        let cursor = crate::cursor::Cursor::after(first.last().unwrap(), first_page.descriptor.sort());
        let next_page = first_page.with_cursor(cursor);
        let (_l2, mut rx2) = open(&store, next_page);
        assert_eq!(ids(rx2.recv().await.unwrap()), ["c", "d"]);
    }

    #[tokio::test]
    async fn dead_sinks_are_pruned_on_publish() {
        let store = InMemoryDataStore::new();
        let query = QueryDescriptor::collection("leads").resolve(&authority("t1")).unwrap();

        let (listener, rx) = open(&store, query);
        drop(rx);
        assert_eq!(store.listener_count(), 1);

        seed(&store, "t1", "leads", "a", json!({ "status": "open" })).await;
        assert_eq!(store.listener_count(), 0);

        drop(listener);
    }
}
