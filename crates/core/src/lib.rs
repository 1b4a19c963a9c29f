//! Shared building blocks for the lifeops notification engine.
//!
//! - [`Event`] and [`Payload`]: the unit of communication between producers and rules
//! - [`EventSink`]: the fire-and-forget contract every producer talks to
//! - [`names`]: the documented event catalog
//! - [`Config`]: environment-driven configuration with profile support
//! - [`expand`] and [`duration`]: helpers for values read from YAML documents

pub mod config;
pub mod duration;
pub mod error;
pub mod event;
pub mod expand;
pub mod names;

pub use config::Config;
pub use error::*;
pub use event::*;
