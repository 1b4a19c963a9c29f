//! YAML document schema.
//!
//! - `RuleEnvelope`: first-pass header (apiVersion, kind, metadata)
//! - `RuleDocument`: enum over the concrete kinds
//! - `NotificationRule`, `ChannelDocument`, `IntegrationDocument`

mod channel;
mod conditions;
mod document;
mod envelope;
mod integration;
mod kind;
mod metadata;
mod rule;

pub use channel::*;
pub use conditions::*;
pub use document::*;
pub use envelope::*;
pub use integration::*;
pub use kind::*;
pub use metadata::*;
pub use rule::*;
