//! Data store interface (external collaborator) and listener lifecycle.
//!
//! The store pushes raw snapshot events into a sink; shaping them into the
//! emission contract is [`crate::subscription::LiveQuery`]'s job. Listeners
//! are explicit cancellable objects: stop is idempotent and dropping a
//! listener cancels it, so no listener can outlive its owning consumer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crewbase_core::{AccessError, DocumentPath};

use crate::query::ResolvedQuery;

/// One stored document: id plus a flat field map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Store-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("permission denied by backend rules")]
    PermissionDenied,

    #[error("target not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied => AccessError::authorization("permission denied by backend rules"),
            StoreError::NotFound => AccessError::configuration("write target does not exist"),
            StoreError::Unavailable(msg) => AccessError::transient_io(msg),
        }
    }
}

/// Raw push from the store for one registered query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEvent {
    /// Full result set for the query window, in store order.
    Snapshot(Vec<Document>),
    /// Transport failure; the query stays registered.
    Error(StoreError),
}

/// Sink a listener pushes events into.
pub type SnapshotSink = mpsc::UnboundedSender<SnapshotEvent>;

/// A mutating operation against a document path.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Create { path: DocumentPath, payload: Value },
    Update { path: DocumentPath, payload: Value },
    Delete { path: DocumentPath },
}

impl WriteOp {
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::Create { path, .. } | WriteOp::Update { path, .. } | WriteOp::Delete { path } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Create { .. } => "create",
            WriteOp::Update { .. } => "update",
            WriteOp::Delete { .. } => "delete",
        }
    }
}

/// External data store contract.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Register a live query. The store must push an initial snapshot and
    /// a new one after every relevant change until the listener is
    /// cancelled.
    fn subscribe(&self, query: ResolvedQuery, sink: SnapshotSink) -> StoreListener;

    async fn write(&self, op: WriteOp) -> Result<(), StoreError>;
}

/// Identifier of a registered listener.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Cancellable registration of a live query.
pub struct StoreListener {
    id: ListenerId,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl StoreListener {
    pub fn new(id: ListenerId, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Deregister from the store. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for StoreListener {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl core::fmt::Debug for StoreListener {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreListener")
            .field("id", &self.id)
            .field("cancelled", &self.cancel.is_none())
            .finish()
    }
}
