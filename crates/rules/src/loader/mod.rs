//! Filesystem document loader with hot reload via a `notify` watcher.
//!
//! Rules, channels and integrations all live as YAML documents under one
//! config directory. The loader keeps them in memory, re-reads files as they
//! change, and serves them to the evaluator, the dispatcher and the sync
//! worker through the store traits.

mod core;
mod error;
mod set;
mod watcher;

#[cfg(test)]
mod tests;

pub use self::core::RuleLoader;
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
