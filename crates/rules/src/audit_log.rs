//! In-memory audit trail of rule evaluations.
//!
//! Keeps the most recent entries per rule (FIFO eviction). Backed by a
//! `std::sync::RwLock` so the evaluator can write from any task without
//! holding an async lock across awaits.

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Stage of a rule evaluation that produced the entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// Conditions evaluated against the event.
    Conditions,
    /// Rule skipped because of its own configuration.
    Configuration,
    /// Sent to channels; details carry the delivery attempts.
    Dispatch,
    /// Sweep bookkeeping (due check, digest).
    Schedule,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub rule_id: String,
    pub event: String,
    pub level: LogLevel,
    pub phase: ExecutionPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Filters for [`AuditLog::query`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    /// Minimum level, inclusive.
    pub level: Option<LogLevel>,
    pub phase: Option<ExecutionPhase>,
    /// Default 100.
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
}

pub struct AuditLog {
    entries: RwLock<HashMap<String, VecDeque<LogEntry>>>,
    max_entries_per_rule: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries_per_rule: max.max(1),
        }
    }

    pub fn record(
        &self,
        rule_id: &str,
        event: &str,
        level: LogLevel,
        phase: ExecutionPhase,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            rule_id: rule_id.to_string(),
            event: event.to_string(),
            level,
            phase,
            message: message.into(),
            details,
        };

        // A panic while holding the lock leaves the map intact; keep logging.
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let deque = guard.entry(rule_id.to_string()).or_default();
        deque.push_back(entry);
        while deque.len() > self.max_entries_per_rule {
            deque.pop_front();
        }
    }

    /// Entries for one rule, newest first.
    pub fn query(&self, rule_id: &str, query: &LogQuery) -> Vec<LogEntry> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let Some(deque) = guard.get(rule_id) else {
            return Vec::new();
        };

        deque
            .iter()
            .rev()
            .filter(|e| query.level.map_or(true, |l| e.level >= l))
            .filter(|e| query.phase.map_or(true, |p| e.phase == p))
            .filter(|e| query.since.map_or(true, |s| e.timestamp >= s))
            .take(query.limit.unwrap_or(100))
            .cloned()
            .collect()
    }

    pub fn latest(&self, rule_id: &str) -> Option<LogEntry> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(rule_id).and_then(|d| d.back().cloned())
    }

    /// Rules with at least one entry, sorted.
    pub fn rule_ids(&self) -> Vec<String> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear(&self, rule_id: &str) {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(rule_id);
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("max_entries_per_rule", &self.max_entries_per_rule)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(log: &AuditLog, rule: &str, phase: ExecutionPhase, msg: &str) {
        log.record(rule, "maintenance.created", LogLevel::Info, phase, msg, None);
    }

    #[test]
    fn newest_first() {
        let log = AuditLog::new();
        info(&log, "oil", ExecutionPhase::Conditions, "matched");
        info(&log, "oil", ExecutionPhase::Dispatch, "sent to 2 channels");

        let entries = log.query("oil", &LogQuery::default());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].phase, ExecutionPhase::Dispatch);
        assert_eq!(log.latest("oil").unwrap().message, "sent to 2 channels");
    }

    #[test]
    fn level_and_phase_filters() {
        let log = AuditLog::new();
        log.record("r1", "e", LogLevel::Debug, ExecutionPhase::Conditions, "no match", None);
        log.record("r1", "e", LogLevel::Warning, ExecutionPhase::Dispatch, "1 of 3 failed", None);
        log.record("r1", "e", LogLevel::Error, ExecutionPhase::Configuration, "bad condition", None);

        let warnings = log.query(
            "r1",
            &LogQuery {
                level: Some(LogLevel::Warning),
                ..LogQuery::default()
            },
        );
        assert_eq!(warnings.len(), 2);

        let dispatch = log.query(
            "r1",
            &LogQuery {
                phase: Some(ExecutionPhase::Dispatch),
                ..LogQuery::default()
            },
        );
        assert_eq!(dispatch.len(), 1);
    }

    #[test]
    fn fifo_eviction_and_limit() {
        let log = AuditLog::with_max_entries(3);
        for i in 1..=4 {
            info(&log, "r1", ExecutionPhase::Conditions, &format!("msg {i}"));
        }
        let entries = log.query("r1", &LogQuery::default());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].message, "msg 2");

        let limited = log.query(
            "r1",
            &LogQuery {
                limit: Some(1),
                ..LogQuery::default()
            },
        );
        assert_eq!(limited[0].message, "msg 4");
    }

    #[test]
    fn per_rule_isolation_and_clear() {
        let log = AuditLog::new();
        info(&log, "r1", ExecutionPhase::Conditions, "a");
        info(&log, "r2", ExecutionPhase::Conditions, "b");
        assert_eq!(log.rule_ids(), vec!["r1", "r2"]);

        log.clear("r1");
        assert!(log.query("r1", &LogQuery::default()).is_empty());
        assert_eq!(log.query("r2", &LogQuery::default()).len(), 1);
        assert!(log.query("missing", &LogQuery::default()).is_empty());
    }

    #[test]
    fn details_are_kept() {
        let log = AuditLog::new();
        let details = serde_json::json!({"channels": ["phone-push"], "failed": 0});
        log.record("r1", "e", LogLevel::Info, ExecutionPhase::Dispatch, "sent", Some(details.clone()));
        assert_eq!(log.latest("r1").unwrap().details, Some(details));
    }
}
