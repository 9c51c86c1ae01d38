//! Live query handles and the per-consumer listener slot.
//!
//! [`LiveQuery`] shapes raw store pushes into the emission contract: every
//! data push yields the full materialized, id-deduplicated list in
//! descriptor sort order with no error; a transport error yields the
//! last-known-good list unchanged with the error attached. Data is never
//! silently cleared on a transient failure.
//!
//! [`LiveQuerySubscription`] is the consumer-side slot: opening a new
//! query tears the previous handle down before the replacement registers,
//! so the listener count per consumer never exceeds one.

use tokio_stream::{Stream, StreamExt, wrappers::UnboundedReceiverStream};
use tracing::debug;

use tokio::sync::mpsc;

use crate::query::ResolvedQuery;
use crate::store::{DataStore, Document, SnapshotEvent, StoreError, StoreListener};

/// One materialized push to the consumer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Emission {
    /// Full result window, id-deduplicated, in descriptor sort order.
    pub items: Vec<Document>,
    /// Transport error, if the latest push was a failure. `items` still
    /// holds the last-known-good data in that case.
    pub error: Option<StoreError>,
}

fn dedupe_by_id(docs: Vec<Document>) -> Vec<Document> {
    let mut seen = std::collections::HashSet::new();
    docs.into_iter()
        .filter(|doc| seen.insert(doc.id.clone()))
        .collect()
}

fn apply_event(last: &mut Emission, event: SnapshotEvent) {
    match event {
        SnapshotEvent::Snapshot(docs) => {
            last.items = dedupe_by_id(docs);
            last.error = None;
        }
        SnapshotEvent::Error(err) => {
            last.error = Some(err);
        }
    }
}

/// A live handle over one resolved query.
///
/// The tenant is pinned at open time; the handle never re-resolves.
#[derive(Debug)]
pub struct LiveQuery {
    query: ResolvedQuery,
    listener: StoreListener,
    rx: mpsc::UnboundedReceiver<SnapshotEvent>,
    last: Emission,
    emitted: bool,
}

impl LiveQuery {
    /// Register the query with the store.
    pub fn open<S: DataStore + ?Sized>(store: &S, query: ResolvedQuery) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = store.subscribe(query.clone(), tx);
        debug!(listener = %listener.id(), path = %query.path, "live query opened");

        Self {
            query,
            listener,
            rx,
            last: Emission::default(),
            emitted: false,
        }
    }

    pub fn query(&self) -> &ResolvedQuery {
        &self.query
    }

    pub fn listener_id(&self) -> crate::store::ListenerId {
        self.listener.id()
    }

    pub fn tenant(&self) -> &str {
        self.query.tenant_segment()
    }

    /// Last emission (empty until the first push arrives).
    pub fn last(&self) -> &Emission {
        &self.last
    }

    /// Whether at least one push has been received. Until then consumers
    /// must render a loading affordance, never "empty data".
    pub fn has_emitted(&self) -> bool {
        self.emitted
    }

    /// Await the next emission. Returns `None` once the handle is closed
    /// and all buffered pushes are drained.
    pub async fn next_emission(&mut self) -> Option<Emission> {
        let event = self.rx.recv().await?;
        apply_event(&mut self.last, event);
        self.emitted = true;
        Some(self.last.clone())
    }

    /// Drain one buffered emission without waiting.
    pub fn try_next_emission(&mut self) -> Option<Emission> {
        let event = self.rx.try_recv().ok()?;
        apply_event(&mut self.last, event);
        self.emitted = true;
        Some(self.last.clone())
    }

    /// Deregister from the store and stop accepting pushes. Idempotent.
    pub fn close(&mut self) {
        if !self.listener.is_cancelled() {
            debug!(listener = %self.listener.id(), path = %self.query.path, "live query closed");
        }
        self.listener.cancel();
        self.rx.close();
    }

    /// Consume the handle as a stream of emissions. The listener is
    /// cancelled when the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = Emission> {
        let LiveQuery {
            listener,
            rx,
            mut last,
            ..
        } = self;

        UnboundedReceiverStream::new(rx).map(move |event| {
            // Held so the registration lives exactly as long as the stream.
            let _owner = &listener;
            apply_event(&mut last, event);
            last.clone()
        })
    }
}

/// Per-consumer subscription slot: at most one live listener at any time.
#[derive(Debug, Default)]
pub struct LiveQuerySubscription {
    current: Option<LiveQuery>,
}

impl LiveQuerySubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `query`, tearing down any previous handle first.
    pub fn open<S: DataStore + ?Sized>(&mut self, store: &S, query: ResolvedQuery) -> &mut LiveQuery {
        // Teardown precedes registration: two live listeners must never
        // coexist for one consumer.
        self.close();
        self.current.insert(LiveQuery::open(store, query))
    }

    /// Close the active handle, if any. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut query) = self.current.take() {
            query.close();
        }
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn active(&self) -> Option<&LiveQuery> {
        self.current.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut LiveQuery> {
        self.current.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::memory::{InMemoryDataStore, LifecycleEvent};
    use crate::query::{QueryDescriptor, SortDir};
    use crate::store::WriteOp;
    use crewbase_auth::{Authority, Role, SubscriptionStatus};
    use crewbase_core::{SubjectId, TenantId};

    fn authority(tenant: &str) -> Authority {
        Authority {
            subject_id: SubjectId::new("u1").unwrap(),
            role: Role::Admin,
            tenant_id: Some(TenantId::new(tenant).unwrap()),
            subscription: SubscriptionStatus::Active,
        }
    }

    fn leads_query(tenant: &str) -> ResolvedQuery {
        QueryDescriptor::collection("leads")
            .order_by("created_at", SortDir::Asc)
            .resolve(&authority(tenant))
            .unwrap()
    }

    async fn seed_lead(store: &InMemoryDataStore, tenant: &str, id: &str, created_at: i64) {
        let path = leads_query(tenant).path.document(id).unwrap();
        store
            .write(WriteOp::Create {
                path,
                payload: json!({ "created_at": created_at, "status": "open" }),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn first_emission_is_materialized_in_sort_order() {
        let store = InMemoryDataStore::new();
        seed_lead(&store, "t1", "b", 2).await;
        seed_lead(&store, "t1", "a", 1).await;

        let mut query = LiveQuery::open(&store, leads_query("t1"));
        assert!(!query.has_emitted());

        let emission = query.next_emission().await.unwrap();
        let ids: Vec<&str> = emission.items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(emission.error.is_none());
    }

    #[tokio::test]
    async fn transport_error_retains_last_known_good() {
        let store = InMemoryDataStore::new();
        seed_lead(&store, "t1", "a", 1).await;

        let mut query = LiveQuery::open(&store, leads_query("t1"));
        let healthy = query.next_emission().await.unwrap();
        assert_eq!(healthy.items.len(), 1);

        store.emit_error("data/t1/leads", StoreError::Unavailable("socket dropped".to_string()));
        let degraded = query.next_emission().await.unwrap();

        assert_eq!(degraded.items, healthy.items);
        assert_eq!(degraded.error, Some(StoreError::Unavailable("socket dropped".to_string())));
    }

    #[tokio::test]
    async fn recovery_clears_the_error() {
        let store = InMemoryDataStore::new();
        seed_lead(&store, "t1", "a", 1).await;

        let mut query = LiveQuery::open(&store, leads_query("t1"));
        query.next_emission().await.unwrap();

        store.emit_error("data/t1/leads", StoreError::Unavailable("blip".to_string()));
        assert!(query.next_emission().await.unwrap().error.is_some());

        seed_lead(&store, "t1", "b", 2).await;
        let recovered = query.next_emission().await.unwrap();
        assert!(recovered.error.is_none());
        assert_eq!(recovered.items.len(), 2);
    }

    #[tokio::test]
    async fn slot_tears_down_before_registering_successor() {
        let store = InMemoryDataStore::new();
        let mut slot = LiveQuerySubscription::new();

        let first_id = slot.open(&store, leads_query("t1")).listener_id();
        let second_id = slot.open(&store, leads_query("t1")).listener_id();

        assert_eq!(store.listener_count(), 1);
        assert_eq!(
            store.lifecycle_log(),
            vec![
                LifecycleEvent::Subscribed(first_id),
                LifecycleEvent::Cancelled(first_id),
                LifecycleEvent::Subscribed(second_id),
            ]
        );
    }

    #[tokio::test]
    async fn close_is_idempotent_and_drop_cancels() {
        let store = InMemoryDataStore::new();
        let mut slot = LiveQuerySubscription::new();
        slot.open(&store, leads_query("t1"));

        slot.close();
        slot.close();
        assert_eq!(store.listener_count(), 0);

        {
            let _query = LiveQuery::open(&store, leads_query("t1"));
            assert_eq!(store.listener_count(), 1);
        }
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn closed_handle_receives_nothing_further() {
        let store = InMemoryDataStore::new();
        seed_lead(&store, "t1", "a", 1).await;

        let mut query = LiveQuery::open(&store, leads_query("t1"));
        query.next_emission().await.unwrap();
        query.close();

        seed_lead(&store, "t1", "b", 2).await;
        assert!(query.next_emission().await.is_none());
    }

    #[tokio::test]
    async fn stream_applies_the_emission_contract() {
        let store = InMemoryDataStore::new();
        seed_lead(&store, "t1", "a", 1).await;

        let query = LiveQuery::open(&store, leads_query("t1"));
        let mut stream = Box::pin(query.into_stream());

        let first = stream.next().await.unwrap();
        assert_eq!(first.items.len(), 1);

        store.emit_error("data/t1/leads", StoreError::Unavailable("blip".to_string()));
        let second = stream.next().await.unwrap();
        assert_eq!(second.items, first.items);
        assert!(second.error.is_some());

        drop(stream);
        assert_eq!(store.listener_count(), 0);
    }
}
