//! [`RuleLoader`]: filesystem-backed document store with optional hot reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use lifeops_integrations::IntegrationConfig;
use lifeops_notify::{ChannelSpec, ChannelStore, NotifyError};

use crate::schema::{NotificationRule, RuleDocument, RuleEnvelope, Timing};
use crate::store::RuleStore;
use crate::validation::{validate_document, ValidationContext};

use super::error::{LoadResult, LoadStatus, Result, RuleError};
use super::set::DocumentSet;
use super::watcher::handle_fs_event;

/// Filesystem-backed document loader with optional hot reload.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files, parses them
/// with two-pass deserialization, validates them, and keeps the accepted
/// documents in memory keyed by `metadata.id`.
pub struct RuleLoader {
    config_dir: PathBuf,
    documents: Arc<RwLock<DocumentSet>>,
    validation: Arc<ValidationContext>,
    /// Held to keep the watcher alive.
    _watcher: Option<Mutex<RecommendedWatcher>>,
}

impl RuleLoader {
    /// Loader validating against the built-in drivers and integration types.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(config_dir: PathBuf) -> Self {
        Self::with_validation(config_dir, ValidationContext::builtin())
    }

    pub fn with_validation(config_dir: PathBuf, validation: ValidationContext) -> Self {
        if !config_dir.exists() {
            if let Err(e) = fs::create_dir_all(&config_dir) {
                warn!(path = %config_dir.display(), error = %e, "failed to create config directory");
            }
        }
        // Watcher events carry canonical paths.
        let config_dir = fs::canonicalize(&config_dir).unwrap_or(config_dir);
        Self {
            config_dir,
            documents: Arc::new(RwLock::new(DocumentSet::default())),
            validation: Arc::new(validation),
            _watcher: None,
        }
    }

    /// Recursively scan the config directory and load every YAML file.
    ///
    /// Dotfiles and non-YAML files are skipped. A file that fails to parse or
    /// validate is reported and left out; the scan continues.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        self.scan_dir_recursive(&self.config_dir, &mut results)?;
        Ok(results)
    }

    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        let mut paths: Vec<PathBuf> = entries.map(|e| e.map(|e| e.path())).collect::<std::io::Result<_>>()?;
        paths.sort();

        for path in paths {
            if is_hidden(&path) {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            if !is_yaml(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            let loaded = self.load_file(&path).and_then(|(doc, warnings)| {
                let rule_id = doc.id().to_string();
                let kind = doc.kind();
                self.write_set()?.insert(&path, doc)?;
                Ok((rule_id, kind, warnings))
            });
            let status = match loaded {
                Ok((rule_id, kind, warnings)) => {
                    info!(rule_id = %rule_id, kind = %kind, path = %path.display(), "loaded document");
                    for w in &warnings {
                        warn!(rule_id = %rule_id, warning = %w, "document warning");
                    }
                    LoadStatus::Loaded { rule_id, warnings }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load document");
                    LoadStatus::Failed { error: e.to_string() }
                }
            };
            results.push(LoadResult { path, status });
        }

        Ok(())
    }

    /// Parse and validate one file. Returns the document and its warnings.
    pub fn load_file(&self, path: &Path) -> Result<(RuleDocument, Vec<String>)> {
        let contents = fs::read_to_string(path)?;
        parse_document(&contents, &self.validation)
    }

    /// Start a recursive filesystem watcher.
    ///
    /// Created or modified files are re-parsed and upserted; deleted files
    /// drop their document. A file that fails to parse during reload keeps
    /// the previous version.
    pub fn watch(&mut self) -> Result<()> {
        let documents = Arc::clone(&self.documents);
        let validation = Arc::clone(&self.validation);

        let mut watcher = notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => handle_fs_event(&event, &documents, &validation),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            }
        })?;

        watcher.watch(&self.config_dir, RecursiveMode::Recursive)?;
        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.config_dir.display(), "watching config directory for changes");
        self._watcher = Some(Mutex::new(watcher));
        Ok(())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// All documents, sorted by id.
    pub fn documents(&self) -> Result<Vec<RuleDocument>> {
        let set = self.read_set()?;
        let mut docs: Vec<_> = set.values().cloned().collect();
        docs.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(docs)
    }

    pub fn document(&self, id: &str) -> Result<Option<RuleDocument>> {
        Ok(self.read_set()?.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.read_set().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enabled integrations, sorted by id, for the sync worker.
    ///
    /// Integrations whose config cannot be built are logged and left out.
    pub fn integrations(&self) -> Result<Vec<IntegrationConfig>> {
        let set = self.read_set()?;
        let mut configs: Vec<_> = set
            .values()
            .filter_map(RuleDocument::as_integration)
            .filter_map(|doc| match doc.to_config() {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    warn!(integration_id = %doc.metadata.id, error = %e, "integration skipped");
                    None
                }
            })
            .filter(|cfg| cfg.enabled)
            .collect();
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(configs)
    }

    /// Validate, then atomically write a document to `{id}.yml`.
    ///
    /// Writes to a dot-prefixed `.tmp` file first and renames it over the
    /// final path, so readers and the watcher never see a partial file.
    pub fn write_document(&self, doc: &RuleDocument) -> Result<PathBuf> {
        let validation = validate_document(doc, &self.validation);
        if !validation.valid {
            return Err(RuleError::Validation(validation.error_summary()));
        }

        let id = doc.id();
        let final_path = self
            .read_set()?
            .path_of(id)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config_dir.join(format!("{id}.yml")));
        let tmp_path = self.config_dir.join(format!(".{id}.tmp"));

        let yaml = doc.to_yaml()?;
        fs::write(&tmp_path, yaml)?;
        fs::rename(&tmp_path, &final_path)?;

        info!(rule_id = %id, kind = %doc.kind(), path = %final_path.display(), "wrote document");
        self.write_set()?.insert(&final_path, doc.clone())?;
        Ok(final_path)
    }

    /// Delete a document's file and drop it from memory.
    pub fn delete_document(&self, id: &str) -> Result<()> {
        let path = {
            let set = self.read_set()?;
            match set.path_of(id) {
                Some(p) => p.to_path_buf(),
                None => [format!("{id}.yml"), format!("{id}.yaml")]
                    .into_iter()
                    .map(|name| self.config_dir.join(name))
                    .find(|p| p.exists())
                    .ok_or_else(|| RuleError::NotFound(id.to_string()))?,
            }
        };

        fs::remove_file(&path)?;
        self.write_set()?.remove_id(id);
        info!(rule_id = %id, path = %path.display(), "deleted document");
        Ok(())
    }

    fn read_set(&self) -> Result<RwLockReadGuard<'_, DocumentSet>> {
        self.documents
            .read()
            .map_err(|_| RuleError::Store("document lock poisoned".to_string()))
    }

    fn write_set(&self) -> Result<RwLockWriteGuard<'_, DocumentSet>> {
        self.documents
            .write()
            .map_err(|_| RuleError::Store("document lock poisoned".to_string()))
    }
}

/// Two-pass parse plus validation.
pub(super) fn parse_document(contents: &str, validation: &ValidationContext) -> Result<(RuleDocument, Vec<String>)> {
    let envelope: RuleEnvelope = serde_yaml::from_str(contents)?;
    if envelope.metadata.id.trim().is_empty() {
        return Err(RuleError::Validation("metadata.id must not be empty".to_string()));
    }

    let doc = envelope
        .parse_full()
        .map_err(|e| RuleError::Validation(format!("failed to parse '{}': {e}", envelope.metadata.id)))?;

    let result = validate_document(&doc, validation);
    if !result.valid {
        return Err(RuleError::Validation(format!(
            "'{}' rejected: {}",
            doc.id(),
            result.error_summary()
        )));
    }
    Ok((doc, result.warning_lines()))
}

pub(super) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yml" || e == "yaml")
}

pub(super) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

// ── Store impls ─────────────────────────────────────────────────────

impl RuleStore for RuleLoader {
    fn rules_for(&self, event: &str, timing: Timing) -> Result<Vec<NotificationRule>> {
        let set = self.read_set()?;
        let mut rules: Vec<_> = set
            .values()
            .filter_map(RuleDocument::as_rule)
            .filter(|r| r.listens_to(event, timing))
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(rules)
    }

    fn scheduled_rules(&self) -> Result<Vec<NotificationRule>> {
        let set = self.read_set()?;
        let mut rules: Vec<_> = set
            .values()
            .filter_map(RuleDocument::as_rule)
            .filter(|r| r.timing() == Timing::Scheduled)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(rules)
    }
}

impl ChannelStore for RuleLoader {
    fn channel(&self, id: &str) -> std::result::Result<Option<ChannelSpec>, NotifyError> {
        let set = self
            .documents
            .read()
            .map_err(|_| NotifyError::Store("document lock poisoned".to_string()))?;
        Ok(set.get(id).and_then(RuleDocument::as_channel).map(|c| c.to_spec()))
    }
}
