//! Route protection: access decisions turned into render states and
//! navigation effects.
//!
//! Navigation fires only from [`RouteGuard::evaluate`], never from
//! snapshot observation, and at most once per denial episode. A denial
//! whose redirect target equals the current path renders in place instead
//! of looping.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crewbase_auth::{AccessDecision, AccessRequest, Session, evaluate};

use crate::navigation::{NavigationService, RedirectPaths};

/// What the protected view should render right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// Claims still resolving; show a loading affordance.
    Loading,
    /// Access granted; render the view.
    Render,
    /// Access denied; a redirect has been issued (or the denial view is
    /// rendered in place when already on the target path).
    Blocked { message: String },
}

/// Guards one route with an [`AccessRequest`].
pub struct RouteGuard<N: ?Sized> {
    nav: Arc<N>,
    paths: RedirectPaths,
    request: AccessRequest,
    current_path: String,
    redirected: bool,
}

impl<N: NavigationService + ?Sized> RouteGuard<N> {
    pub fn new(nav: Arc<N>, request: AccessRequest, current_path: impl Into<String>) -> Self {
        Self {
            nav,
            paths: RedirectPaths::default(),
            request,
            current_path: current_path.into(),
            redirected: false,
        }
    }

    pub fn with_paths(mut self, paths: RedirectPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Swap the access requirements (route change). Resets the redirect
    /// latch so a new denial may navigate again.
    pub fn set_request(&mut self, request: AccessRequest) {
        self.request = request;
        self.redirected = false;
    }

    pub fn set_current_path(&mut self, path: impl Into<String>) {
        self.current_path = path.into();
        self.redirected = false;
    }

    /// Re-evaluate against a session snapshot.
    pub fn evaluate(&mut self, session: &Session) -> GuardState {
        match evaluate(session, &self.request) {
            AccessDecision::Pending => GuardState::Loading,
            AccessDecision::Allow => {
                self.redirected = false;
                GuardState::Render
            }
            AccessDecision::DenyRole { redirect, message }
            | AccessDecision::DenySubscription { redirect, message } => {
                let target = self.paths.path_for(redirect).to_string();

                if target == self.current_path {
                    return GuardState::Blocked { message };
                }

                if !self.redirected {
                    self.redirected = true;
                    debug!(from = %self.current_path, to = %target, "route guard redirecting");
                    self.nav.redirect(&target, true);
                }

                GuardState::Blocked { message }
            }
        }
    }

    /// Drive the guard from a session channel. Each snapshot is evaluated
    /// synchronously on receipt and the resulting state handed to
    /// `on_state`. Returns when the session source goes away.
    pub async fn watch<F>(&mut self, mut sessions: watch::Receiver<Session>, mut on_state: F)
    where
        F: FnMut(GuardState),
    {
        loop {
            let session = sessions.borrow_and_update().clone();
            on_state(self.evaluate(&session));

            if sessions.changed().await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewbase_auth::{Authority, Role, SubscriptionStatus};
    use crewbase_core::{SubjectId, TenantId};

    use crate::navigation::RecordingNavigation;

    fn ready(role: Role, subscription: SubscriptionStatus) -> Session {
        Session::Ready(Authority {
            subject_id: SubjectId::new("u1").unwrap(),
            role,
            tenant_id: Some(TenantId::new("t1").unwrap()),
            subscription,
        })
    }

    fn guard(request: AccessRequest, path: &str) -> (Arc<RecordingNavigation>, RouteGuard<RecordingNavigation>) {
        let nav = Arc::new(RecordingNavigation::new());
        let guard = RouteGuard::new(Arc::clone(&nav), request, path);
        (nav, guard)
    }

    #[test]
    fn pending_renders_loading_without_navigation() {
        let (nav, mut guard) = guard(AccessRequest::roles([Role::Admin]), "/leads");

        assert_eq!(guard.evaluate(&Session::Initializing), GuardState::Loading);
        assert!(nav.redirects().is_empty());
    }

    #[test]
    fn allow_renders_the_view() {
        let (nav, mut guard) = guard(AccessRequest::roles([Role::Admin]), "/leads");

        let state = guard.evaluate(&ready(Role::Admin, SubscriptionStatus::Active));
        assert_eq!(state, GuardState::Render);
        assert!(nav.redirects().is_empty());
    }

    #[test]
    fn denial_redirects_exactly_once() {
        let (nav, mut guard) = guard(AccessRequest::roles([Role::Admin]), "/leads");
        let session = ready(Role::Csr, SubscriptionStatus::Active);

        assert!(matches!(guard.evaluate(&session), GuardState::Blocked { .. }));
        assert!(matches!(guard.evaluate(&session), GuardState::Blocked { .. }));

        assert_eq!(nav.redirects(), vec![("/no-access".to_string(), true)]);
    }

    #[test]
    fn unauthenticated_redirects_to_sign_in() {
        let (nav, mut guard) = guard(AccessRequest::signed_in(), "/leads");

        guard.evaluate(&Session::Unauthenticated);
        assert_eq!(nav.last(), Some(("/sign-in".to_string(), true)));
    }

    #[test]
    fn denial_on_the_target_path_renders_in_place() {
        let (nav, mut guard) = guard(AccessRequest::roles([Role::Admin]), "/no-access");

        let state = guard.evaluate(&ready(Role::Csr, SubscriptionStatus::Active));
        assert!(matches!(state, GuardState::Blocked { .. }));
        assert!(nav.redirects().is_empty());
    }

    #[test]
    fn allow_rearms_the_redirect_latch() {
        let (nav, mut guard) = guard(
            AccessRequest::signed_in().with_subscription(SubscriptionStatus::Active),
            "/reports",
        );

        guard.evaluate(&ready(Role::Manager, SubscriptionStatus::Inactive));
        guard.evaluate(&ready(Role::Manager, SubscriptionStatus::Active));
        guard.evaluate(&ready(Role::Manager, SubscriptionStatus::Inactive));

        assert_eq!(
            nav.redirects(),
            vec![("/upgrade".to_string(), true), ("/upgrade".to_string(), true)]
        );
    }

    #[test]
    fn subscription_denial_message_differs_from_role_denial() {
        let (_nav, mut guard) = guard(
            AccessRequest::roles([Role::Csr]).with_subscription(SubscriptionStatus::Active),
            "/leads",
        );

        let GuardState::Blocked { message: role_msg } =
            guard.evaluate(&ready(Role::Manager, SubscriptionStatus::Active))
        else {
            panic!("expected a blocked state");
        };

        guard.set_request(AccessRequest::roles([Role::Manager]).with_subscription(SubscriptionStatus::Active));
        let GuardState::Blocked { message: sub_msg } =
            guard.evaluate(&ready(Role::Manager, SubscriptionStatus::Inactive))
        else {
            panic!("expected a blocked state");
        };

        assert!(role_msg.contains("role"));
        assert!(sub_msg.contains("subscription"));
        assert_ne!(role_msg, sub_msg);
    }

    #[tokio::test]
    async fn watch_follows_session_snapshots() {
        let (nav, mut guard) = guard(AccessRequest::signed_in(), "/leads");
        let (tx, rx) = watch::channel(Session::Initializing);

        let states = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&states);
        let driver = tokio::spawn(async move {
            guard.watch(rx, move |state| sink.lock().unwrap().push(state)).await;
        });
        // Let the driver observe the initial snapshot before changing it.
        tokio::task::yield_now().await;

        tx.send(ready(Role::Csr, SubscriptionStatus::Active)).unwrap();
        tokio::task::yield_now().await;
        tx.send(Session::Unauthenticated).unwrap();
        tokio::task::yield_now().await;
        drop(tx);
        driver.await.unwrap();

        let states = states.lock().unwrap().clone();
        assert_eq!(
            states,
            vec![
                GuardState::Loading,
                GuardState::Render,
                GuardState::Blocked {
                    message: "please sign in to continue".to_string()
                },
            ]
        );
        assert_eq!(nav.last(), Some(("/sign-in".to_string(), true)));
    }
}
