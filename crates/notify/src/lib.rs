//! Notification delivery for lifeops rules.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - ntfy, Pushover, Discord, webhook, Telegram, and email drivers
//! - `ChannelRegistry` mapping driver names to constructors
//! - Minijinja template rendering with a lenient fallback
//! - `Dispatcher` that resolves a rule's channels and delivers concurrently

pub mod channel;
pub mod discord;
pub mod dispatcher;
pub mod email;
pub mod ntfy;
pub mod pushover;
pub mod telegram;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use channel::{ChannelRegistry, ChannelSpec, ChannelStore, DriverContext, DriverKind, StaticChannelStore};
pub use dispatcher::Dispatcher;
pub use templating::TemplateRenderer;
pub use traits::{DeliveryAttempt, Notification, Notifier, NotifyError, Priority};
