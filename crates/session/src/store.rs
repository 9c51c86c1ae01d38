//! Claims store: the single owner of session state.
//!
//! The store consumes identity lifecycle events, resolves claims through
//! the provider, and publishes whole [`Session`] snapshots over a watch
//! channel. Concurrent in-flight fetches are serialized by a monotonic
//! generation counter: a fetch resolving under a stale generation is
//! discarded, so updates always apply in receipt order.
//!
//! Failure policy is fail-closed throughout: exhausted retries, terminal
//! provider errors, and claims that do not normalize all end in
//! `Unauthenticated`, never in stale authority or infinite loading.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crewbase_auth::{Authority, Claims, Identity, Session, validate_identity};
use crewbase_core::SubjectId;

use crate::provider::{ClaimsFetchError, IdentityEvent, IdentityProvider};
use crate::retry::RetryPolicy;

/// Owner of claims resolution and session snapshot distribution.
pub struct ClaimsStore<P> {
    provider: Arc<P>,
    retry: RetryPolicy,
    tx: watch::Sender<Session>,
    state: Mutex<StoreState>,
}

struct StoreState {
    /// Monotonic guard against stale in-flight fetches.
    generation: u64,
    identity: Option<Identity>,
    /// Last-known-good claims per subject, for fast paint on identity
    /// change. Reconciled by the authoritative refetch that follows.
    cache: HashMap<SubjectId, Claims>,
}

impl<P: IdentityProvider> ClaimsStore<P> {
    pub fn new(provider: Arc<P>, retry: RetryPolicy) -> Self {
        let (tx, _rx) = watch::channel(Session::Initializing);
        Self {
            provider,
            retry,
            tx,
            state: Mutex::new(StoreState {
                generation: 0,
                identity: None,
                cache: HashMap::new(),
            }),
        }
    }

    /// Subscribe to session snapshots. Late subscribers immediately see
    /// the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Current session snapshot.
    pub fn session(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Handle an identity change pushed by the provider.
    ///
    /// `None` is a sign-out. `Some` publishes a fast-paint snapshot from
    /// cached claims when available (else falls back to `Initializing`),
    /// then forces an authoritative refetch.
    pub async fn on_identity_changed(&self, identity: Option<Identity>) {
        let generation = {
            let mut state = self.state.lock().unwrap();
            state.generation += 1;

            let Some(identity) = identity else {
                info!("identity cleared; session is unauthenticated");
                state.identity = None;
                let _ = self.tx.send(Session::Unauthenticated);
                return;
            };

            if let Err(err) = validate_identity(&identity, Utc::now()) {
                warn!(subject = %identity.subject_id, %err, "rejecting identity with invalid token window");
                state.identity = None;
                let _ = self.tx.send(Session::Unauthenticated);
                return;
            }

            match state.cache.get(&identity.subject_id) {
                Some(cached) => {
                    debug!(subject = %identity.subject_id, "fast paint from cached claims");
                    let _ = self.tx.send(Session::Ready(Authority::new(&identity, cached)));
                }
                None => {
                    let _ = self.tx.send(Session::Initializing);
                }
            }

            state.identity = Some(identity);
            state.generation
        };

        self.refresh(generation).await;
    }

    /// Handle an out-of-band token refresh signal: refetch and replace
    /// claims atomically.
    pub async fn on_token_refresh(&self) {
        let generation = {
            let mut state = self.state.lock().unwrap();
            if state.identity.is_none() {
                return;
            }
            state.generation += 1;
            state.generation
        };

        self.refresh(generation).await;
    }

    /// Fetch claims with bounded retry, applying the result only if
    /// `generation` is still current.
    async fn refresh(&self, generation: u64) {
        let mut failures: u32 = 0;

        loop {
            let result = self.provider.fetch_claims(true).await;

            match result {
                Ok(raw) => {
                    let mut state = self.state.lock().unwrap();
                    if state.generation != generation {
                        debug!(generation, "discarding claims fetch superseded by a newer update");
                        return;
                    }
                    let Some(identity) = state.identity.clone() else {
                        return;
                    };

                    match Claims::from_raw(&raw) {
                        Ok(claims) => {
                            state.cache.insert(identity.subject_id.clone(), claims.clone());
                            let _ = self.tx.send(Session::Ready(Authority::new(&identity, &claims)));
                            debug!(subject = %identity.subject_id, "claims reconciled");
                        }
                        Err(err) => {
                            // Malformed claims must force re-auth, not a
                            // guessed role.
                            warn!(subject = %identity.subject_id, %err, "claims failed normalization; signing out");
                            state.identity = None;
                            let _ = self.tx.send(Session::Unauthenticated);
                        }
                    }
                    return;
                }

                Err(ClaimsFetchError::Terminal(msg)) => {
                    warn!(%msg, "terminal claims failure; signing out");
                    self.fail_closed(generation);
                    return;
                }

                Err(ClaimsFetchError::Transient(msg)) => {
                    failures += 1;
                    if !self.retry.should_retry(failures) {
                        warn!(%msg, failures, "claims fetch retries exhausted; signing out");
                        self.fail_closed(generation);
                        return;
                    }

                    debug!(%msg, failures, "transient claims failure; backing off");
                    tokio::time::sleep(self.retry.delay_after_failure(failures)).await;

                    if self.state.lock().unwrap().generation != generation {
                        return;
                    }
                }
            }
        }
    }

    /// Publish `Unauthenticated` unless a newer update superseded this one.
    fn fail_closed(&self, generation: u64) {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            return;
        }
        state.identity = None;
        let _ = self.tx.send(Session::Unauthenticated);
    }

    /// Drive the store from the provider's event stream.
    ///
    /// Events are handled strictly in receipt order; the loop exits when
    /// the provider drops its sender.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<IdentityEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                IdentityEvent::IdentityChanged(identity) => self.on_identity_changed(identity).await,
                IdentityEvent::TokenRefreshed => self.on_token_refresh().await,
            }
        }
        debug!("identity event stream closed; claims store loop exiting");
    }
}

impl<P: IdentityProvider + 'static> ClaimsStore<P> {
    /// Construct a store and run its event loop on the runtime.
    ///
    /// The store subscribes to the provider before the loop starts, so no
    /// event between construction and first poll is lost.
    pub fn spawn(provider: Arc<P>, retry: RetryPolicy) -> (Arc<Self>, ClaimsStoreHandle) {
        let events = provider.events();
        let store = Arc::new(Self::new(provider, retry));
        let runner = Arc::clone(&store);

        let join = tokio::spawn(async move { runner.run(events).await });

        (store, ClaimsStoreHandle { join })
    }
}

/// Handle to the running event loop.
#[derive(Debug)]
pub struct ClaimsStoreHandle {
    join: tokio::task::JoinHandle<()>,
}

impl ClaimsStoreHandle {
    /// Stop the event loop. The store itself stays usable as a snapshot
    /// source; it just stops reacting to provider events.
    pub fn shutdown(self) {
        self.join.abort();
    }
}
