//! Identity provider interface (external collaborator).
//!
//! The provider owns token issuance, decoding, and verification; the
//! boundary layer only consumes the results. Push events are delivered
//! over a channel whose receiver is owned, and torn down, by
//! [`crate::ClaimsStore`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crewbase_auth::{Identity, RawClaims};
use crewbase_core::AccessError;

/// Identity lifecycle events pushed by the provider.
#[derive(Debug, Clone)]
pub enum IdentityEvent {
    /// A subject signed in (`Some`) or out (`None`).
    IdentityChanged(Option<Identity>),
    /// The provider rotated the token out-of-band; claims may have changed
    /// without re-authentication (e.g. an org switch).
    TokenRefreshed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignInError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("network failure during sign-in: {0}")]
    Network(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsFetchError {
    /// Worth retrying (network hiccup, provider briefly unavailable).
    #[error("transient claims fetch failure: {0}")]
    Transient(String),

    /// Not worth retrying (revoked token, deleted account).
    #[error("terminal claims fetch failure: {0}")]
    Terminal(String),
}

impl From<ClaimsFetchError> for AccessError {
    fn from(err: ClaimsFetchError) -> Self {
        match err {
            ClaimsFetchError::Transient(msg) => AccessError::transient_io(msg),
            ClaimsFetchError::Terminal(msg) => AccessError::terminal_auth(msg),
        }
    }
}

/// External identity provider contract.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, SignInError>;

    async fn sign_out(&self);

    /// Fetch the current subject's claims. `force_refresh` bypasses any
    /// provider-side token cache and is what the store uses for
    /// authoritative reconciliation.
    async fn fetch_claims(&self, force_refresh: bool) -> Result<RawClaims, ClaimsFetchError>;

    /// Subscribe to identity lifecycle events.
    fn events(&self) -> mpsc::UnboundedReceiver<IdentityEvent>;
}
