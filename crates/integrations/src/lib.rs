//! Polling drivers for external systems (Docker, Portainer, Home Assistant).
//!
//! Drivers return a [`Snapshot`] of resource states; the [`SyncWorker`]
//! diffs consecutive snapshots and emits the transitions as events.

pub mod config;
pub mod drivers;
pub mod error;
pub mod registry;
pub mod snapshot;
pub mod traits;
pub mod worker;

pub use config::{IntegrationConfig, DEFAULT_POLL_INTERVAL};
pub use error::IntegrationError;
pub use registry::IntegrationRegistry;
pub use snapshot::{diff, ResourceState, Snapshot, Transition};
pub use traits::{ConfigField, IntegrationDescriptor, IntegrationDriver};
pub use worker::{IntegrationStatus, PollOutcome, SyncPhase, SyncWorker};
