//! Navigation seam and redirect path configuration.

use std::sync::Mutex;

use crewbase_auth::RedirectTarget;

/// Host-provided navigation (external collaborator).
pub trait NavigationService: Send + Sync {
    /// Navigate to `path`. `replace` substitutes the current history entry
    /// instead of pushing a new one.
    fn redirect(&self, path: &str, replace: bool);
}

/// Where each denial class sends the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPaths {
    pub sign_in: String,
    pub no_access: String,
    pub upgrade: String,
}

impl Default for RedirectPaths {
    fn default() -> Self {
        Self {
            sign_in: "/sign-in".to_string(),
            no_access: "/no-access".to_string(),
            upgrade: "/upgrade".to_string(),
        }
    }
}

impl RedirectPaths {
    pub fn path_for(&self, target: RedirectTarget) -> &str {
        match target {
            RedirectTarget::SignIn => &self.sign_in,
            RedirectTarget::NoAccess => &self.no_access,
            RedirectTarget::Upgrade => &self.upgrade,
        }
    }
}

/// Navigation double for tests/dev: records every redirect.
#[derive(Debug, Default)]
pub struct RecordingNavigation {
    redirects: Mutex<Vec<(String, bool)>>,
}

impl RecordingNavigation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<(String, bool)> {
        self.redirects.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<(String, bool)> {
        self.redirects.lock().unwrap().last().cloned()
    }
}

impl NavigationService for RecordingNavigation {
    fn redirect(&self, path: &str, replace: bool) {
        self.redirects.lock().unwrap().push((path.to_string(), replace));
    }
}
