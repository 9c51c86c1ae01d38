//! Immutable session snapshots.
//!
//! A `Session` is the one atomic view the rest of the system reads. Role,
//! tenant, and subscription only exist inside `Ready`, so a torn
//! combination (fresh role with stale tenant, say) is unrepresentable.
//! Snapshots are produced by one owning store and distributed by value;
//! nothing reads a mutable global.

use serde::{Deserialize, Serialize};

use crewbase_core::{SubjectId, TenantId};

use crate::claims::{Claims, Identity};
use crate::roles::{Role, SubscriptionStatus};

/// Fully resolved authority of a signed-in subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub subject_id: SubjectId,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub subscription: SubscriptionStatus,
}

impl Authority {
    pub fn new(identity: &Identity, claims: &Claims) -> Self {
        Self {
            subject_id: identity.subject_id.clone(),
            role: claims.role,
            tenant_id: claims.tenant_id.clone(),
            subscription: claims.subscription,
        }
    }
}

/// One atomic session snapshot.
///
/// Lifecycle: `Initializing` at bootstrap; `Ready` once identity and
/// claims have both resolved; `Unauthenticated` on sign-out or an
/// irrecoverable token failure. `Ready` and `Unauthenticated` are the only
/// terminal states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    Initializing,
    Unauthenticated,
    Ready(Authority),
}

impl Session {
    pub fn is_ready(&self) -> bool {
        matches!(self, Session::Ready(_))
    }

    pub fn authority(&self) -> Option<&Authority> {
        match self {
            Session::Ready(authority) => Some(authority),
            _ => None,
        }
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.authority().and_then(|a| a.tenant_id.as_ref())
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::Initializing
    }
}
