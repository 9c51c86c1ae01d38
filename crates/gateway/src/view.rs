//! Inline access status for views that render their own denial chrome.

use crewbase_auth::{AccessDecision, AccessRequest, RedirectTarget, Session, evaluate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    Loading,
    Granted,
    Denied,
}

/// Access status plus the user-facing denial message, if any.
///
/// Messages always distinguish "please sign in" from "wrong role" from
/// "subscription required".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewAccess {
    pub status: ViewStatus,
    pub message: Option<String>,
    pub redirect: Option<RedirectTarget>,
}

pub fn view_access(session: &Session, request: &AccessRequest) -> ViewAccess {
    match evaluate(session, request) {
        AccessDecision::Pending => ViewAccess {
            status: ViewStatus::Loading,
            message: None,
            redirect: None,
        },
        AccessDecision::Allow => ViewAccess {
            status: ViewStatus::Granted,
            message: None,
            redirect: None,
        },
        AccessDecision::DenyRole { redirect, message }
        | AccessDecision::DenySubscription { redirect, message } => ViewAccess {
            status: ViewStatus::Denied,
            message: Some(message),
            redirect: Some(redirect),
        },
    }
}
