//! Notification rules for lifeops.
//!
//! This crate provides:
//! - YAML documents for rules, channels and integrations (two-pass envelope parsing)
//! - Filesystem loader with hot-reload via `notify` watcher
//! - Validation with fuzzy suggestions for event names, drivers and types
//! - The rule evaluator shared by immediate and scheduled rules
//! - The in-process [`EventBus`] producers emit into
//! - The cron-driven [`ScheduledSweep`] and its built-in sources
//! - An in-memory per-rule audit log

pub mod audit_log;
pub mod bus;
pub mod evaluator;
pub mod loader;
pub mod schema;
pub mod sources;
pub mod store;
pub mod sweep;
pub mod ticks;
pub mod validation;

pub use bus::{BusError, EventBus};
pub use evaluator::{EvaluateError, EvaluationReport, RuleEvaluator};
pub use loader::{LoadResult, LoadStatus, RuleError, RuleLoader};
pub use store::{RuleStore, StaticRuleStore};
pub use sweep::{ScheduledSweep, SweepError, SweepReport, SweepSource};
pub use ticks::TickLedger;
