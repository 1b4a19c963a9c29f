//! Error types and load result structures for the document loader.

use std::path::PathBuf;

/// Errors raised while loading, storing or reading documents.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document parsed but failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// Rules, channels and integrations share one id namespace.
    #[error("duplicate id '{id}', already defined in {}", existing.display())]
    DuplicateId { id: String, existing: PathBuf },

    #[error("Document not found: {0}")]
    NotFound(String),

    /// The in-memory store could not be read (poisoned lock).
    #[error("Store unavailable: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// Outcome of loading a single file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub enum LoadStatus {
    Loaded { rule_id: String, warnings: Vec<String> },
    /// Dotfile, non-YAML, etc.
    Skipped { reason: String },
    /// Parse or validation error; siblings still load.
    Failed { error: String },
}

impl LoadResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, LoadStatus::Failed { .. })
    }
}
