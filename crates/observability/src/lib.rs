//! `crewbase-observability` — logging/tracing setup for host processes.

pub mod tracing;

pub use tracing::init;
