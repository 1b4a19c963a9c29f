//! Filesystem event handler for the notify watcher (hot reload).

use std::fs;
use std::sync::{Arc, RwLock};

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use crate::validation::ValidationContext;

use super::core::{is_hidden, is_yaml, parse_document};
use super::set::DocumentSet;

pub(super) fn handle_fs_event(
    event: &Event,
    documents: &Arc<RwLock<DocumentSet>>,
    validation: &ValidationContext,
) {
    for path in &event.paths {
        // Dotfiles include our own `.tmp` writes.
        if !is_yaml(path) || is_hidden(path) {
            continue;
        }

        match &event.kind {
            EventKind::Create(CreateKind::File)
            | EventKind::Create(CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(_)) => {
                if !path.exists() {
                    // Rename away from this path.
                    remove_path(documents, path);
                    continue;
                }
                let contents = match fs::read_to_string(path) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to read file during hot reload");
                        continue;
                    }
                };
                match parse_document(&contents, validation) {
                    Ok((doc, _)) => {
                        let rule_id = doc.id().to_string();
                        let kind = doc.kind();
                        let Ok(mut set) = documents.write() else {
                            warn!(path = %path.display(), "document lock poisoned, reload dropped");
                            continue;
                        };
                        match set.insert(path, doc) {
                            Ok(()) => info!(rule_id = %rule_id, kind = %kind, path = %path.display(), "hot-reloaded document"),
                            Err(e) => warn!(
                                path = %path.display(),
                                error = %e,
                                "document rejected during hot reload, keeping previous version"
                            ),
                        }
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to parse document during hot reload, keeping previous version"
                        );
                    }
                }
            }
            EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
                remove_path(documents, path);
            }
            _ => {}
        }
    }
}

fn remove_path(documents: &Arc<RwLock<DocumentSet>>, path: &std::path::Path) {
    let Ok(mut set) = documents.write() else {
        warn!(path = %path.display(), "document lock poisoned, removal dropped");
        return;
    };
    if let Some(doc) = set.remove_path(path) {
        info!(rule_id = %doc.id(), path = %path.display(), "removed document after file deletion");
    }
}
