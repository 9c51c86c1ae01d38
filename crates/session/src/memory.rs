//! In-memory identity provider for tests/dev.
//!
//! Supports scripted failures and artificial fetch latency so store
//! behavior under races and outages can be exercised deterministically.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crewbase_auth::{Identity, RawClaims};

use crate::provider::{ClaimsFetchError, IdentityEvent, IdentityProvider, SignInError};

#[derive(Default)]
struct ProviderState {
    accounts: HashMap<String, Account>,
    current: Option<CurrentSubject>,
    fetch_delay: Option<Duration>,
    scripted_failures: VecDeque<ClaimsFetchError>,
    persistent_failure: Option<ClaimsFetchError>,
    fetch_count: u32,
    subscribers: Vec<mpsc::UnboundedSender<IdentityEvent>>,
}

struct Account {
    password: String,
    identity: Identity,
    claims: RawClaims,
}

struct CurrentSubject {
    identity: Identity,
    claims: RawClaims,
}

/// In-memory pub/sub identity provider.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    state: Mutex<ProviderState>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account that `sign_in` will accept.
    pub fn register(&self, email: &str, password: &str, identity: Identity, claims: RawClaims) {
        let mut state = self.state.lock().unwrap();
        state.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity,
                claims,
            },
        );
    }

    /// Force the current subject without emitting an event. Tests drive
    /// the store's handlers directly after this.
    pub fn set_current(&self, identity: Identity, claims: RawClaims) {
        let mut state = self.state.lock().unwrap();
        state.current = Some(CurrentSubject { identity, claims });
    }

    /// Replace the current subject's claims (e.g. an org switch) and push
    /// a token refresh so subscribed stores reconcile.
    pub fn rotate_claims(&self, claims: RawClaims) {
        let mut state = self.state.lock().unwrap();
        if let Some(current) = state.current.as_mut() {
            current.claims = claims;
        }
        broadcast(&mut state, IdentityEvent::TokenRefreshed);
    }

    /// Fail the next `fetch_claims` call with `err`, once.
    pub fn fail_next_fetch(&self, err: ClaimsFetchError) {
        self.state.lock().unwrap().scripted_failures.push_back(err);
    }

    /// Fail every `fetch_claims` call with `err` until cleared.
    pub fn fail_all_fetches(&self, err: ClaimsFetchError) {
        self.state.lock().unwrap().persistent_failure = Some(err);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.scripted_failures.clear();
        state.persistent_failure = None;
    }

    /// Artificial latency applied to every `fetch_claims` call.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().fetch_delay = delay;
    }

    /// Number of `fetch_claims` calls observed.
    pub fn fetch_count(&self) -> u32 {
        self.state.lock().unwrap().fetch_count
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, SignInError> {
        let mut state = self.state.lock().unwrap();

        let account = state.accounts.get(email).ok_or(SignInError::InvalidCredentials)?;
        if account.password != password {
            return Err(SignInError::InvalidCredentials);
        }

        let identity = account.identity.clone();
        let claims = account.claims.clone();
        state.current = Some(CurrentSubject {
            identity: identity.clone(),
            claims,
        });
        broadcast(&mut state, IdentityEvent::IdentityChanged(Some(identity.clone())));

        Ok(identity)
    }

    async fn sign_out(&self) {
        let mut state = self.state.lock().unwrap();
        state.current = None;
        broadcast(&mut state, IdentityEvent::IdentityChanged(None));
    }

    async fn fetch_claims(&self, _force_refresh: bool) -> Result<RawClaims, ClaimsFetchError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.fetch_count += 1;
            state.fetch_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.scripted_failures.pop_front() {
            return Err(err);
        }
        if let Some(err) = &state.persistent_failure {
            return Err(err.clone());
        }

        state
            .current
            .as_ref()
            .map(|current| current.claims.clone())
            .ok_or_else(|| ClaimsFetchError::Terminal("no signed-in subject".to_string()))
    }

    fn events(&self) -> mpsc::UnboundedReceiver<IdentityEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().subscribers.push(tx);
        rx
    }
}

fn broadcast(state: &mut ProviderState, event: IdentityEvent) {
    // Drop any dead subscribers while publishing.
    state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
}
