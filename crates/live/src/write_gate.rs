//! Client-side tenant write gate.
//!
//! A fast-fail convenience only: authoritative enforcement lives in the
//! backend's rules. It exists so a cross-tenant write fails synchronously
//! at the boundary instead of after a network round trip.

use tracing::warn;

use crewbase_auth::Authority;
use crewbase_core::{AccessError, AccessResult, TenantId};

use crate::store::{DataStore, WriteOp};

/// Gate asserting that every write targets the caller's own tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantWriteGate {
    tenant: TenantId,
}

impl TenantWriteGate {
    /// Pin the gate to the authority's tenant.
    pub fn new(authority: &Authority) -> AccessResult<Self> {
        let tenant = authority
            .tenant_id
            .clone()
            .ok_or_else(|| AccessError::configuration("cannot gate writes: session has no tenant"))?;
        Ok(Self { tenant })
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Reject `op` unless its path's tenant segment matches the pinned
    /// tenant.
    pub fn check(&self, op: &WriteOp) -> AccessResult<()> {
        let target = op.path().tenant_segment();
        if target != self.tenant.as_str() {
            warn!(
                kind = op.kind(),
                path = %op.path(),
                tenant = %self.tenant,
                "rejected write targeting a foreign tenant"
            );
            return Err(AccessError::authorization(format!(
                "write targets tenant {target:?} but the session is scoped to {:?}",
                self.tenant.as_str()
            )));
        }
        Ok(())
    }

    /// Check `op`, then submit it. A rejected op never reaches the store.
    pub async fn submit<S: DataStore + ?Sized>(&self, store: &S, op: WriteOp) -> AccessResult<()> {
        self.check(&op)?;
        store.write(op).await.map_err(AccessError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::memory::InMemoryDataStore;
    use crewbase_auth::{Role, SubscriptionStatus};
    use crewbase_core::{CollectionPath, SubjectId};

    fn authority(tenant: Option<&str>) -> Authority {
        Authority {
            subject_id: SubjectId::new("u1").unwrap(),
            role: Role::Manager,
            tenant_id: tenant.map(|t| TenantId::new(t).unwrap()),
            subscription: SubscriptionStatus::Active,
        }
    }

    fn doc_path(tenant: &str, collection: &str, id: &str) -> crewbase_core::DocumentPath {
        CollectionPath::new(&TenantId::new(tenant).unwrap(), collection)
            .unwrap()
            .document(id)
            .unwrap()
    }

    #[test]
    fn gate_requires_a_tenant() {
        let err = TenantWriteGate::new(&authority(None)).unwrap_err();
        assert!(matches!(err, AccessError::Configuration(_)));
    }

    #[test]
    fn same_tenant_write_passes_check() {
        let gate = TenantWriteGate::new(&authority(Some("t1"))).unwrap();
        let op = WriteOp::Create {
            path: doc_path("t1", "leads", "l1"),
            payload: json!({ "status": "open" }),
        };
        assert!(gate.check(&op).is_ok());
    }

    #[test]
    fn cross_tenant_write_is_rejected() {
        let gate = TenantWriteGate::new(&authority(Some("t1"))).unwrap();
        for op in [
            WriteOp::Create {
                path: doc_path("t2", "leads", "l1"),
                payload: json!({}),
            },
            WriteOp::Update {
                path: doc_path("t2", "leads", "l1"),
                payload: json!({}),
            },
            WriteOp::Delete {
                path: doc_path("t2", "leads", "l1"),
            },
        ] {
            let err = gate.check(&op).unwrap_err();
            assert!(matches!(err, AccessError::Authorization(_)));
        }
    }

    #[tokio::test]
    async fn rejected_write_never_reaches_the_store() {
        let store = InMemoryDataStore::new();
        let gate = TenantWriteGate::new(&authority(Some("t1"))).unwrap();

        let err = gate
            .submit(
                &store,
                WriteOp::Create {
                    path: doc_path("t2", "leads", "l1"),
                    payload: json!({ "status": "open" }),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AccessError::Authorization(_)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn accepted_write_is_submitted() {
        let store = InMemoryDataStore::new();
        let gate = TenantWriteGate::new(&authority(Some("t1"))).unwrap();

        gate.submit(
            &store,
            WriteOp::Create {
                path: doc_path("t1", "leads", "l1"),
                payload: json!({ "status": "open" }),
            },
        )
        .await
        .unwrap();

        assert_eq!(store.write_count(), 1);
    }
}
