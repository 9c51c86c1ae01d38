//! `crewbase-auth` — pure authorization boundary (zero-trust).
//!
//! Claims normalization, the session snapshot model, and the access policy
//! live here. This crate is intentionally decoupled from IO and any
//! identity-provider transport: claims arrive already decoded, and the
//! policy is a pure function over one immutable snapshot.

pub mod claims;
pub mod policy;
pub mod roles;
pub mod session;

pub use claims::{Claims, ClaimsError, Identity, RawClaims, TokenValidationError, validate_identity};
pub use policy::{AccessDecision, AccessRequest, RedirectTarget, evaluate};
pub use roles::{Role, SubscriptionStatus};
pub use session::{Authority, Session};
