//! `crewbase-live` — tenant-scoped live queries and writes.
//!
//! A view declares a [`QueryDescriptor`]; resolving it against the session
//! authority pins the tenant into a [`crewbase_core::CollectionPath`] that
//! cannot be forged from caller input. [`LiveQuery`] turns raw store pushes
//! into the materialized emission contract, [`LiveQuerySubscription`]
//! bounds each consumer to one live listener, and [`TenantWriteGate`]
//! fast-fails writes that leave the caller's tenant.

pub mod cursor;
pub mod memory;
pub mod query;
pub mod store;
pub mod subscription;
pub mod write_gate;

pub use cursor::Cursor;
pub use memory::{InMemoryDataStore, LifecycleEvent};
pub use query::{Filter, FilterOp, QueryDescriptor, ResolvedQuery, SortDir, SortKey};
pub use store::{DataStore, Document, ListenerId, SnapshotEvent, SnapshotSink, StoreError, StoreListener, WriteOp};
pub use subscription::{Emission, LiveQuery, LiveQuerySubscription};
pub use write_gate::TenantWriteGate;
