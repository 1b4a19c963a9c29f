//! In-memory document set indexed by id and by source file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::schema::RuleDocument;

use super::error::{Result, RuleError};

#[derive(Debug, Default)]
pub(super) struct DocumentSet {
    by_id: HashMap<String, RuleDocument>,
    /// Source file of each id, so deletes resolve even when the filename
    /// differs from `metadata.id`.
    by_path: HashMap<PathBuf, String>,
}

impl DocumentSet {
    /// Insert or replace the document owned by `path`. A file whose id
    /// changed drops its old id. An id already owned by another file is
    /// rejected and the set is left untouched.
    pub(super) fn insert(&mut self, path: &Path, doc: RuleDocument) -> Result<()> {
        let id = doc.id().to_string();
        if let Some(owner) = self.path_of(&id) {
            if owner != path {
                return Err(RuleError::DuplicateId {
                    id,
                    existing: owner.to_path_buf(),
                });
            }
        }
        if let Some(previous) = self.by_path.insert(path.to_path_buf(), id.clone()) {
            if previous != id {
                self.by_id.remove(&previous);
            }
        }
        self.by_id.insert(id, doc);
        Ok(())
    }

    pub(super) fn remove_path(&mut self, path: &Path) -> Option<RuleDocument> {
        let id = self.by_path.remove(path)?;
        self.by_id.remove(&id)
    }

    pub(super) fn remove_id(&mut self, id: &str) -> Option<RuleDocument> {
        self.by_path.retain(|_, v| v != id);
        self.by_id.remove(id)
    }

    pub(super) fn path_of(&self, id: &str) -> Option<&Path> {
        self.by_path
            .iter()
            .find(|(_, v)| v.as_str() == id)
            .map(|(p, _)| p.as_path())
    }

    pub(super) fn get(&self, id: &str) -> Option<&RuleDocument> {
        self.by_id.get(id)
    }

    pub(super) fn values(&self) -> impl Iterator<Item = &RuleDocument> {
        self.by_id.values()
    }

    pub(super) fn len(&self) -> usize {
        self.by_id.len()
    }
}
