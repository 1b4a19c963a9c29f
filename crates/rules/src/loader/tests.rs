//! Tests for the document loader.

use std::fs;

use tempfile::TempDir;

use lifeops_notify::ChannelStore;

use super::*;
use crate::schema::{RuleDocument, RuleKind, Timing};
use crate::store::RuleStore;

const RULE_YAML: &str = r#"
apiVersion: v1
kind: NotificationRule
metadata:
  id: oil-change-logged
  name: Oil change logged
trigger:
  event: maintenance.created
channels: [phone-push]
template:
  title: "{{ vehicle_name }} serviced"
"#;

const SCHEDULED_YAML: &str = r#"
apiVersion: v1
kind: NotificationRule
metadata:
  id: maintenance-due
  name: Maintenance due
trigger:
  event: maintenance.due_soon
  timing: scheduled
channels: [phone-push]
template:
  title: "{{ service_type }} due"
"#;

const CHANNEL_YAML: &str = r#"
apiVersion: v1
kind: Channel
metadata:
  id: phone-push
  name: Phone
driver: ntfy
config:
  topic: garage
"#;

const INTEGRATION_YAML: &str = r#"
apiVersion: v1
kind: Integration
metadata:
  id: nas-docker
  name: NAS Docker
type: docker
connection:
  base_url: http://nas.local:2375
poll_interval: 2m
"#;

fn temp_loader() -> (TempDir, RuleLoader) {
    let dir = TempDir::new().expect("create tempdir");
    let loader = RuleLoader::new(dir.path().to_path_buf());
    (dir, loader)
}

fn loaded_ids(results: &[LoadResult]) -> Vec<&str> {
    results
        .iter()
        .filter_map(|r| match &r.status {
            LoadStatus::Loaded { rule_id, .. } => Some(rule_id.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn load_rule_from_file() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("oil.yml");
    fs::write(&path, RULE_YAML).unwrap();

    let (doc, warnings) = loader.load_file(&path).unwrap();
    assert_eq!(doc.id(), "oil-change-logged");
    assert_eq!(doc.kind(), RuleKind::NotificationRule);
    assert!(warnings.is_empty(), "{warnings:?}");
}

#[test]
fn load_all_skips_dotfiles_and_non_yaml() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("rule.yml"), RULE_YAML).unwrap();
    fs::write(dir.path().join(".hidden.yml"), RULE_YAML).unwrap();
    fs::write(dir.path().join("readme.txt"), "not a rule").unwrap();

    let results = loader.load_all().unwrap();
    let skipped = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Skipped { .. }))
        .count();

    assert_eq!(loaded_ids(&results), vec!["oil-change-logged"]);
    assert_eq!(skipped, 2);
    assert_eq!(loader.len(), 1);
}

#[test]
fn load_all_multi_kind_recursive() {
    let (dir, loader) = temp_loader();
    for sub in ["rules", "channels", "integrations"] {
        fs::create_dir(dir.path().join(sub)).unwrap();
    }
    fs::write(dir.path().join("rules/oil.yml"), RULE_YAML).unwrap();
    fs::write(dir.path().join("rules/due.yaml"), SCHEDULED_YAML).unwrap();
    fs::write(dir.path().join("channels/phone.yml"), CHANNEL_YAML).unwrap();
    fs::write(dir.path().join("integrations/nas.yml"), INTEGRATION_YAML).unwrap();

    let results = loader.load_all().unwrap();
    assert_eq!(loaded_ids(&results).len(), 4);

    let docs = loader.documents().unwrap();
    let kinds: Vec<_> = docs.iter().map(|d| (d.id(), d.kind())).collect();
    assert_eq!(
        kinds,
        vec![
            ("maintenance-due", RuleKind::NotificationRule),
            ("nas-docker", RuleKind::Integration),
            ("oil-change-logged", RuleKind::NotificationRule),
            ("phone-push", RuleKind::Channel),
        ]
    );
}

#[test]
fn malformed_file_does_not_block_siblings() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("good.yml"), RULE_YAML).unwrap();
    fs::write(dir.path().join("bad.yml"), "not valid yaml: [[[").unwrap();
    // Parses, but has no channels: rejected by validation.
    fs::write(
        dir.path().join("invalid.yml"),
        RULE_YAML.replace("channels: [phone-push]", "channels: []").replace("oil-change-logged", "no-channels"),
    )
    .unwrap();

    let results = loader.load_all().unwrap();
    assert_eq!(loaded_ids(&results), vec!["oil-change-logged"]);
    assert_eq!(results.iter().filter(|r| r.is_failed()).count(), 2);
    assert!(loader.document("no-channels").unwrap().is_none());
}

#[test]
fn duplicate_id_across_kinds_is_rejected() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("a-channel.yml"), CHANNEL_YAML).unwrap();
    fs::write(
        dir.path().join("b-rule.yml"),
        RULE_YAML.replace("id: oil-change-logged", "id: phone-push"),
    )
    .unwrap();

    let results = loader.load_all().unwrap();
    assert_eq!(loaded_ids(&results), vec!["phone-push"]);
    let failed: Vec<_> = results.iter().filter(|r| r.is_failed()).collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].path.ends_with("b-rule.yml"));
    match &failed[0].status {
        LoadStatus::Failed { error } => {
            assert!(error.contains("duplicate id 'phone-push'"), "{error}");
            assert!(error.contains("a-channel.yml"), "{error}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    // The first owner survives, and a second scan reports the same.
    assert_eq!(loader.document("phone-push").unwrap().unwrap().kind(), RuleKind::Channel);
    assert!(loader.rules_for("maintenance.created", Timing::Immediate).unwrap().is_empty());
    assert!(loader.channel("phone-push").unwrap().is_some());
    assert_eq!(loader.load_all().unwrap().iter().filter(|r| r.is_failed()).count(), 1);

    // The id resolves to the file that owns it.
    loader.delete_document("phone-push").unwrap();
    assert!(!dir.path().join("a-channel.yml").exists());
    assert!(dir.path().join("b-rule.yml").exists());
}

#[test]
fn empty_id_is_rejected() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("empty.yml");
    fs::write(&path, RULE_YAML.replace("id: oil-change-logged", "id: \"\"")).unwrap();
    assert!(matches!(loader.load_file(&path), Err(RuleError::Validation(_))));
}

#[test]
fn warnings_are_reported_on_load() {
    let (dir, loader) = temp_loader();
    fs::write(
        dir.path().join("odd.yml"),
        RULE_YAML.replace("maintenance.created", "maintenance.finished"),
    )
    .unwrap();
    let results = loader.load_all().unwrap();
    match &results[0].status {
        LoadStatus::Loaded { warnings, .. } => assert_eq!(warnings.len(), 1),
        other => panic!("expected Loaded, got {other:?}"),
    }
}

#[test]
fn rule_store_filters_by_event_and_timing() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("oil.yml"), RULE_YAML).unwrap();
    fs::write(dir.path().join("due.yml"), SCHEDULED_YAML).unwrap();
    fs::write(
        dir.path().join("off.yml"),
        RULE_YAML
            .replace("oil-change-logged", "disabled-rule")
            .replace("name: Oil change logged", "name: Off\n  enabled: false"),
    )
    .unwrap();
    loader.load_all().unwrap();

    let immediate = loader.rules_for("maintenance.created", Timing::Immediate).unwrap();
    assert_eq!(immediate.len(), 1);
    assert_eq!(immediate[0].id(), "oil-change-logged");

    assert!(loader.rules_for("maintenance.due_soon", Timing::Immediate).unwrap().is_empty());
    assert_eq!(loader.rules_for("maintenance.due_soon", Timing::Scheduled).unwrap().len(), 1);
    assert_eq!(loader.scheduled_rules().unwrap()[0].id(), "maintenance-due");
}

#[test]
fn channel_store_and_integrations() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("phone.yml"), CHANNEL_YAML).unwrap();
    fs::write(dir.path().join("nas.yml"), INTEGRATION_YAML).unwrap();
    loader.load_all().unwrap();

    let spec = loader.channel("phone-push").unwrap().unwrap();
    assert_eq!(spec.driver, "ntfy");
    assert!(loader.channel("nas-docker").unwrap().is_none());
    assert!(loader.channel("missing").unwrap().is_none());

    let integrations = loader.integrations().unwrap();
    assert_eq!(integrations.len(), 1);
    assert_eq!(integrations[0].poll_interval, std::time::Duration::from_secs(120));
}

#[test]
fn write_and_read_back() {
    let (dir, loader) = temp_loader();
    let envelope: crate::schema::RuleEnvelope = serde_yaml::from_str(CHANNEL_YAML).unwrap();
    let doc = envelope.parse_full().unwrap();

    let path = loader.write_document(&doc).unwrap();
    assert_eq!(path.file_name().unwrap(), "phone-push.yml");
    assert!(!dir.path().join(".phone-push.tmp").exists());

    let (loaded, _) = loader.load_file(&path).unwrap();
    assert_eq!(loaded, doc);
    assert!(loader.channel("phone-push").unwrap().is_some());
}

#[test]
fn write_rejects_invalid_document() {
    let (_dir, loader) = temp_loader();
    let envelope: crate::schema::RuleEnvelope =
        serde_yaml::from_str(&CHANNEL_YAML.replace("driver: ntfy", "driver: fax")).unwrap();
    let doc = envelope.parse_full().unwrap();
    assert!(matches!(loader.write_document(&doc), Err(RuleError::Validation(_))));
    assert!(loader.is_empty());
}

#[test]
fn rewrite_keeps_original_file() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("my-channels.yaml"), CHANNEL_YAML).unwrap();
    loader.load_all().unwrap();

    let mut doc = loader.document("phone-push").unwrap().unwrap();
    if let RuleDocument::Channel(ref mut c) = doc {
        c.metadata.enabled = false;
    }
    let path = loader.write_document(&doc).unwrap();
    assert_eq!(path.file_name().unwrap(), "my-channels.yaml");
    assert!(!loader.channel("phone-push").unwrap().unwrap().enabled);
}

#[test]
fn delete_removes_file_and_entry() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("oil-notes.yml");
    fs::write(&path, RULE_YAML).unwrap();
    loader.load_all().unwrap();

    loader.delete_document("oil-change-logged").unwrap();
    assert!(!path.exists());
    assert!(loader.document("oil-change-logged").unwrap().is_none());
}

#[test]
fn delete_nonexistent_errors() {
    let (_dir, loader) = temp_loader();
    let err = loader.delete_document("no-such-doc").unwrap_err();
    assert!(matches!(err, RuleError::NotFound(_)));
}

#[test]
fn new_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("sub").join("config");
    assert!(!nested.exists());

    let _loader = RuleLoader::new(nested.clone());
    assert!(nested.exists());
}

// ── Hot reload ──────────────────────────────────────────────────────

mod reload {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use notify::{Event, EventKind};
    use std::sync::{Arc, RwLock};

    use crate::loader::set::DocumentSet;
    use crate::loader::watcher::handle_fs_event;
    use crate::validation::ValidationContext;

    fn fire(kind: EventKind, path: &std::path::Path, set: &Arc<RwLock<DocumentSet>>) {
        let event = Event::new(kind).add_path(path.to_path_buf());
        handle_fs_event(&event, set, &ValidationContext::builtin());
    }

    #[test]
    fn create_modify_delete_cycle() {
        let dir = TempDir::new().unwrap();
        let set = Arc::new(RwLock::new(DocumentSet::default()));
        let path = dir.path().join("oil.yml");

        fs::write(&path, RULE_YAML).unwrap();
        fire(EventKind::Create(CreateKind::File), &path, &set);
        assert!(set.read().unwrap().get("oil-change-logged").is_some());

        // Broken edit keeps the previous version.
        fs::write(&path, "trigger: [").unwrap();
        fire(EventKind::Modify(ModifyKind::Any), &path, &set);
        assert!(set.read().unwrap().get("oil-change-logged").is_some());

        // Changing the id replaces the old entry.
        fs::write(&path, RULE_YAML.replace("oil-change-logged", "oil-change-v2")).unwrap();
        fire(EventKind::Modify(ModifyKind::Any), &path, &set);
        assert!(set.read().unwrap().get("oil-change-logged").is_none());
        assert!(set.read().unwrap().get("oil-change-v2").is_some());

        fs::remove_file(&path).unwrap();
        fire(EventKind::Remove(RemoveKind::File), &path, &set);
        assert_eq!(set.read().unwrap().len(), 0);
    }

    #[test]
    fn reload_rejects_id_owned_by_another_file() {
        let dir = TempDir::new().unwrap();
        let set = Arc::new(RwLock::new(DocumentSet::default()));
        let channel = dir.path().join("phone.yml");
        let rule = dir.path().join("rule.yml");

        fs::write(&channel, CHANNEL_YAML).unwrap();
        fire(EventKind::Create(CreateKind::File), &channel, &set);
        fs::write(&rule, RULE_YAML).unwrap();
        fire(EventKind::Create(CreateKind::File), &rule, &set);

        // The rule is edited to reuse the channel's id: previous rule kept.
        fs::write(&rule, RULE_YAML.replace("id: oil-change-logged", "id: phone-push")).unwrap();
        fire(EventKind::Modify(ModifyKind::Any), &rule, &set);
        {
            let set = set.read().unwrap();
            assert_eq!(set.get("phone-push").unwrap().kind(), RuleKind::Channel);
            assert!(set.get("oil-change-logged").is_some());
        }

        // Removing the rule file never takes the channel with it.
        fs::remove_file(&rule).unwrap();
        fire(EventKind::Remove(RemoveKind::File), &rule, &set);
        let set = set.read().unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("phone-push").is_some());
    }

    #[test]
    fn temp_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        let set = Arc::new(RwLock::new(DocumentSet::default()));
        let tmp = dir.path().join(".oil.yml");
        fs::write(&tmp, RULE_YAML).unwrap();
        fire(EventKind::Create(CreateKind::File), &tmp, &set);
        assert_eq!(set.read().unwrap().len(), 0);
    }
}
