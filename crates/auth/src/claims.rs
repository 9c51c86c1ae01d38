//! Identity tokens and claims (transport-agnostic).
//!
//! The identity provider decodes/verifies tokens; this module models the
//! minimal shapes the boundary expects afterwards, and is the single point
//! where raw claim strings are normalized into the closed vocabularies.
//! Claims are never treated as final authority — writes are re-validated
//! server-side by backend rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crewbase_core::{AccessError, SubjectId, TenantId};

use crate::roles::{Role, SubscriptionStatus};

/// An authenticated identity, immutable per token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: SubjectId,
    pub email_verified: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate an identity's token time window.
pub fn validate_identity(identity: &Identity, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if identity.expires_at <= identity.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < identity.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= identity.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Claims exactly as the provider hands them over: free-form strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawClaims {
    pub role: String,
    pub tenant_id: Option<String>,
    pub subscription_status: String,
}

/// Validated authorization claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub role: Role,
    pub tenant_id: Option<TenantId>,
    pub subscription: SubscriptionStatus,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("{0}")]
    UnknownRole(#[from] crate::roles::UnknownRole),

    #[error("{0}")]
    UnknownSubscription(#[from] crate::roles::UnknownSubscriptionStatus),

    #[error("invalid tenant id: {0}")]
    InvalidTenant(String),
}

impl Claims {
    /// Normalize raw claim strings into the closed vocabularies.
    ///
    /// Unrecognized role/subscription strings are rejected here rather than
    /// compared case-sensitively downstream.
    pub fn from_raw(raw: &RawClaims) -> Result<Self, ClaimsError> {
        let role: Role = raw.role.parse()?;
        let subscription: SubscriptionStatus = raw.subscription_status.parse()?;
        let tenant_id = match &raw.tenant_id {
            Some(value) => Some(
                TenantId::new(value.clone()).map_err(|e| ClaimsError::InvalidTenant(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            role,
            tenant_id,
            subscription,
        })
    }
}

impl From<ClaimsError> for AccessError {
    /// Claims that do not normalize force re-authentication; mapping to a
    /// default role or `None` subscription would be a fail-open.
    fn from(err: ClaimsError) -> Self {
        AccessError::terminal_auth(err.to_string())
    }
}
