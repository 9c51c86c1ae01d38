//! Access policy for protected views and actions.
//!
//! `evaluate` is a pure function over one session snapshot and one access
//! request. The check order is part of the contract:
//!
//! 1. still loading → `Pending` (never a denial flash before claims arrive)
//! 2. signed out → role denial with a sign-in redirect
//! 3. role requirement
//! 4. subscription requirement
//!
//! Role before subscription means a privileged-but-unsubscribed admin gets
//! an upgrade prompt instead of a generic denial.
//!
//! - No IO
//! - No panics

use serde::{Deserialize, Serialize};

use crate::roles::{Role, SubscriptionStatus};
use crate::session::Session;

/// Access requirements declared by a protected view. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Roles allowed to see the view. Empty means any signed-in role.
    pub required_roles: Vec<Role>,
    /// Subscription status the tenant must hold, if any.
    pub required_subscription: Option<SubscriptionStatus>,
}

impl AccessRequest {
    /// A view any signed-in subject may see.
    pub fn signed_in() -> Self {
        Self::default()
    }

    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            required_roles: roles.into_iter().collect(),
            required_subscription: None,
        }
    }

    pub fn with_subscription(mut self, status: SubscriptionStatus) -> Self {
        self.required_subscription = Some(status);
        self
    }
}

/// Where a denied subject should be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    SignIn,
    NoAccess,
    Upgrade,
}

/// Outcome of evaluating an access request against a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessDecision {
    /// Claims are still resolving; render a loading affordance.
    Pending,
    Allow,
    /// Signed out, or signed in with the wrong role.
    DenyRole {
        redirect: RedirectTarget,
        message: String,
    },
    /// Role passed but the tenant's subscription does not qualify.
    DenySubscription {
        redirect: RedirectTarget,
        message: String,
    },
}

impl AccessDecision {
    pub fn redirect(&self) -> Option<RedirectTarget> {
        match self {
            AccessDecision::Pending | AccessDecision::Allow => None,
            AccessDecision::DenyRole { redirect, .. }
            | AccessDecision::DenySubscription { redirect, .. } => Some(*redirect),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            AccessDecision::Pending | AccessDecision::Allow => None,
            AccessDecision::DenyRole { message, .. }
            | AccessDecision::DenySubscription { message, .. } => Some(message),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Evaluate `request` against `session`.
pub fn evaluate(session: &Session, request: &AccessRequest) -> AccessDecision {
    let authority = match session {
        Session::Initializing => return AccessDecision::Pending,
        Session::Unauthenticated => {
            return AccessDecision::DenyRole {
                redirect: RedirectTarget::SignIn,
                message: "please sign in to continue".to_string(),
            };
        }
        Session::Ready(authority) => authority,
    };

    if !request.required_roles.is_empty() && !request.required_roles.contains(&authority.role) {
        let allowed = request
            .required_roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        return AccessDecision::DenyRole {
            redirect: RedirectTarget::NoAccess,
            message: format!(
                "this view requires one of the roles [{allowed}]; your role is {}",
                authority.role
            ),
        };
    }

    if let Some(required) = request.required_subscription {
        if authority.subscription != required {
            return AccessDecision::DenySubscription {
                redirect: RedirectTarget::Upgrade,
                message: format!(
                    "an {required} subscription is required; current status is {}",
                    authority.subscription
                ),
            };
        }
    }

    AccessDecision::Allow
}
