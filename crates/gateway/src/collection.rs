//! Live, paginated, tenant-pinned collection facade.
//!
//! Wraps one [`LiveQuerySubscription`], so a mounted view never holds more
//! than one live listener. The tenant is pinned when the subscription
//! opens; `sync_session` re-pins on an org switch by closing the stale
//! handle before the replacement registers, which is what guarantees zero
//! emissions from the old tenant after the switch.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crewbase_auth::Session;
use crewbase_core::{AccessError, AccessResult, TenantId};
use crewbase_live::{
    Cursor, DataStore, Document, Emission, LiveQuerySubscription, QueryDescriptor, StoreError,
};

/// Tenant-scoped live collection for one mounted view.
pub struct TenantCollection<S: DataStore + ?Sized> {
    store: Arc<S>,
    base: QueryDescriptor,
    slot: LiveQuerySubscription,
    pinned: Option<TenantId>,
    /// Windows frozen by `load_more`. They no longer receive live
    /// updates; the single live listener always covers the newest window.
    frozen: Vec<Document>,
    error: Option<StoreError>,
}

impl<S: DataStore + ?Sized> TenantCollection<S> {
    pub fn new(store: Arc<S>, base: QueryDescriptor) -> Self {
        Self {
            store,
            base,
            slot: LiveQuerySubscription::new(),
            pinned: None,
            frozen: Vec::new(),
            error: None,
        }
    }

    /// Reconcile with a session snapshot.
    ///
    /// First `Ready` opens the subscription; a tenant change closes the
    /// stale handle and reopens under the new tenant; `Unauthenticated`
    /// tears everything down. `Initializing` leaves state untouched.
    pub fn sync_session(&mut self, session: &Session) -> AccessResult<()> {
        match session {
            Session::Initializing => Ok(()),
            Session::Unauthenticated => {
                self.teardown();
                Ok(())
            }
            Session::Ready(authority) => {
                let Some(tenant) = authority.tenant_id.clone() else {
                    self.teardown();
                    return Err(AccessError::configuration(format!(
                        "cannot mount collection {:?}: session has no tenant",
                        self.base.collection_name()
                    )));
                };

                if self.pinned.as_ref() == Some(&tenant) {
                    return Ok(());
                }

                if let Some(previous) = &self.pinned {
                    info!(
                        collection = self.base.collection_name(),
                        from = %previous,
                        to = %tenant,
                        "tenant changed; reopening collection"
                    );
                }

                self.frozen.clear();
                self.error = None;
                let resolved = self.base.clone().resolve(authority)?;
                // Slot teardown precedes registration of the new handle.
                self.slot.open(self.store.as_ref(), resolved);
                self.pinned = Some(tenant);
                Ok(())
            }
        }
    }

    /// Await the next emission of the live window.
    pub async fn next_emission(&mut self) -> Option<Emission> {
        let live = self.slot.active_mut()?;
        let emission = live.next_emission().await?;
        self.error = emission.error.clone();
        Some(emission)
    }

    /// Drain one buffered emission without waiting.
    pub fn try_refresh(&mut self) -> Option<Emission> {
        let live = self.slot.active_mut()?;
        let emission = live.try_next_emission()?;
        self.error = emission.error.clone();
        Some(emission)
    }

    /// All loaded items: frozen pages plus the live window, id-keyed.
    pub fn items(&self) -> Vec<Document> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        let live_items = self.slot.active().map(|q| q.last().items.as_slice()).unwrap_or(&[]);
        for doc in self.frozen.iter().chain(live_items) {
            if seen.insert(doc.id.as_str()) {
                out.push(doc.clone());
            }
        }
        out
    }

    /// True until the current window has received its first emission.
    /// Consumers render a loading affordance, never "empty data".
    pub fn loading(&self) -> bool {
        match self.slot.active() {
            Some(live) => !live.has_emitted(),
            None => true,
        }
    }

    pub fn error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.slot.is_open()
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.pinned.as_ref()
    }

    /// Freeze the current window and re-register the single listener
    /// strictly after its last sort key. Returns false when there is
    /// nothing further to load.
    pub fn load_more(&mut self) -> bool {
        let Some(live) = self.slot.active() else {
            return false;
        };
        if !live.has_emitted() {
            return false;
        }

        let emission = live.last();
        let window = live.query().descriptor.window();
        // A short window means the store ran out of rows.
        if emission.items.len() < window {
            return false;
        }
        let Some(last) = emission.items.last() else {
            return false;
        };

        let cursor = Cursor::after(last, live.query().descriptor.sort());
        let next = live.query().with_cursor(cursor);
        let page = emission.items.clone();

        debug!(
            collection = self.base.collection_name(),
            after = last.id.as_str(),
            "loading next keyset page"
        );

        self.frozen.extend(page);
        self.slot.open(self.store.as_ref(), next);
        true
    }

    /// Unmount: close the listener and drop loaded data. Idempotent.
    pub fn close(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.slot.close();
        self.pinned = None;
        self.frozen.clear();
        self.error = None;
    }
}

impl<S: DataStore + ?Sized> Drop for TenantCollection<S> {
    fn drop(&mut self) {
        self.slot.close();
    }
}
