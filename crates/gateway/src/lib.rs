//! `crewbase-gateway` — what protected views actually consume.
//!
//! [`RouteGuard`] turns access decisions into render states and one-time
//! redirects; [`view_access`] is the inline equivalent for views that
//! manage their own chrome; [`TenantCollection`] is the live, paginated,
//! tenant-pinned data facade.

pub mod collection;
pub mod navigation;
pub mod route_guard;
pub mod view;

pub use collection::TenantCollection;
pub use navigation::{NavigationService, RecordingNavigation, RedirectPaths};
pub use route_guard::{GuardState, RouteGuard};
pub use view::{ViewAccess, ViewStatus, view_access};
