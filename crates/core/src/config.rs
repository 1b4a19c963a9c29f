use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::format_duration;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub store: StoreConfig,
    pub notify: NotifyConfig,
    pub sweep: SweepConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LIFEOPS_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LIFEOPS_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            store: StoreConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
            sweep: SweepConfig::from_env_profiled(p),
            sync: SyncConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  store:   config_dir={}, watch={}, audit_max_entries={}",
            self.store.config_dir.display(),
            self.store.watch,
            self.store.audit_max_entries
        );
        tracing::info!("  notify:  send_timeout={}", format_duration(self.notify.send_timeout()));
        tracing::info!(
            "  sweep:   tick={}, default_cron='{}', maintenance_file={}",
            format_duration(self.sweep.tick()),
            self.sweep.default_cron,
            self.sweep.maintenance_file.display()
        );
        tracing::info!(
            "  sync:    tick={}, poll_timeout={}, failure_threshold={}",
            format_duration(self.sync.tick()),
            format_duration(self.sync.poll_timeout()),
            self.sync.failure_threshold
        );
    }
}

// ── Store ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory holding rule, channel, and integration YAML documents.
    pub config_dir: PathBuf,
    /// Reload documents when files change.
    pub watch: bool,
    /// Audit log entries kept per rule.
    pub audit_max_entries: usize,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            config_dir: PathBuf::from(profiled_env_or(p, "CONFIG_DIR", "config")),
            watch: profiled_env_bool(p, "WATCH_CONFIG", true),
            audit_max_entries: profiled_env_u32(p, "AUDIT_MAX_ENTRIES", 500) as usize,
        }
    }
}

// ── Notify ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub send_timeout_secs: u64,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            send_timeout_secs: profiled_env_u64(p, "NOTIFY_SEND_TIMEOUT_SECS", 10),
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs.max(1))
    }
}

// ── Scheduled sweep ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub tick_secs: u64,
    /// Cron used by scheduled rules that do not declare their own.
    pub default_cron: String,
    /// YAML export of maintenance intervals consumed by the sweep.
    pub maintenance_file: PathBuf,
    pub due_soon_days: i64,
    pub due_soon_miles: f64,
}

impl SweepConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            tick_secs: profiled_env_u64(p, "SWEEP_TICK_SECS", 60),
            default_cron: profiled_env_or(p, "SWEEP_DEFAULT_CRON", "0 8 * * *"),
            maintenance_file: PathBuf::from(profiled_env_or(
                p,
                "MAINTENANCE_FILE",
                "data/maintenance.yml",
            )),
            due_soon_days: profiled_env_u64(p, "MAINTENANCE_DUE_SOON_DAYS", 14) as i64,
            due_soon_miles: profiled_env_u64(p, "MAINTENANCE_DUE_SOON_MILES", 500) as f64,
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

// ── Integration sync ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub tick_secs: u64,
    pub poll_timeout_secs: u64,
    /// Consecutive poll failures before `integration.unreachable` is emitted.
    pub failure_threshold: u32,
}

impl SyncConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            tick_secs: profiled_env_u64(p, "SYNC_TICK_SECS", 15),
            poll_timeout_secs: profiled_env_u64(p, "SYNC_POLL_TIMEOUT_SECS", 20),
            failure_threshold: profiled_env_u32(p, "SYNC_FAILURE_THRESHOLD", 2).max(1),
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs.max(1))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_secs: 15,
            poll_timeout_secs: 20,
            failure_threshold: 2,
        }
    }
}
