//! Closed role and subscription vocabularies.
//!
//! Raw claim payloads carry these as free-form strings with inconsistent
//! casing; both enums normalize case-insensitively at this boundary and
//! reject anything unrecognized. Downstream code only ever compares enum
//! values.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RBAC role granted within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Csr,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Csr => "csr",
        }
    }

    /// All roles, for request builders and diagnostics.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Csr];
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        for role in Role::ALL {
            if normalized.eq_ignore_ascii_case(role.as_str()) {
                return Ok(role);
            }
        }
        Err(UnknownRole(s.to_string()))
    }
}

/// Billing state of the tenant's subscription, as asserted by claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    Inactive,
    None,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::None => "none",
        }
    }

    const ALL: [SubscriptionStatus; 4] = [
        SubscriptionStatus::Active,
        SubscriptionStatus::Trialing,
        SubscriptionStatus::Inactive,
        SubscriptionStatus::None,
    ];
}

impl core::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized subscription status: {0:?}")]
pub struct UnknownSubscriptionStatus(pub String);

impl FromStr for SubscriptionStatus {
    type Err = UnknownSubscriptionStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        for status in SubscriptionStatus::ALL {
            if normalized.eq_ignore_ascii_case(status.as_str()) {
                return Ok(status);
            }
        }
        Err(UnknownSubscriptionStatus(s.to_string()))
    }
}
