//! Shared error taxonomy for the access boundary.

use thiserror::Error;

/// Result type used across the boundary layer.
pub type AccessResult<T> = Result<T, AccessError>;

/// Boundary-level error.
///
/// Every failure the boundary can produce falls into one of these four
/// classes. Callers branch on the class, not on message text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Programmer error (e.g. building a tenant path without a tenant).
    /// Must surface loudly; never swallowed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Role/subscription/tenant mismatch. Expected, user-facing,
    /// recoverable via redirect.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Network hiccup during claims/query IO. Retried with backoff; stale
    /// data is retained while retrying.
    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    /// Irrecoverable token/claims failure. Forces sign-out.
    #[error("terminal authentication failure: {0}")]
    TerminalAuth(String),
}

impl AccessError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn transient_io(msg: impl Into<String>) -> Self {
        Self::TransientIo(msg.into())
    }

    pub fn terminal_auth(msg: impl Into<String>) -> Self {
        Self::TerminalAuth(msg.into())
    }

    /// Whether a local retry is appropriate for this error.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::TransientIo(_))
    }
}
