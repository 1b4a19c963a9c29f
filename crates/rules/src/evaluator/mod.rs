//! Rule evaluation: match an event against rules, render, dispatch.
//!
//! Both timing modes share this path. Immediate rules are evaluated by
//! [`RuleEvaluator::evaluate_event`] at emit time; scheduled rules are
//! evaluated by the sweep through [`RuleEvaluator::evaluate_scheduled`],
//! restricted to the rules that are due.

mod conditions;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use lifeops_core::Event;
use lifeops_notify::{DeliveryAttempt, Dispatcher, Notification, TemplateRenderer};

use crate::audit_log::{AuditLog, ExecutionPhase, LogLevel};
use crate::loader::RuleError;
use crate::schema::{NotificationRule, Timing};
use crate::store::RuleStore;

pub use conditions::{check_condition, loose_eq, matches, matches_all, ConditionError};

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error("rule store unavailable: {0}")]
    Store(#[from] RuleError),
}

// ── Report ──────────────────────────────────────────────────────────

/// A rule that matched and was dispatched.
#[derive(Debug, Clone, Serialize)]
pub struct RuleFiring {
    pub rule_id: String,
    pub notification: Notification,
    pub attempts: Vec<DeliveryAttempt>,
}

impl RuleFiring {
    pub fn failed_attempts(&self) -> usize {
        self.attempts.iter().filter(|a| !a.success).count()
    }
}

/// A rule left out because its own configuration is broken.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRule {
    pub rule_id: String,
    pub reason: String,
}

/// What one event did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub event: String,
    /// Rules considered (enabled, same trigger and timing).
    pub candidates: usize,
    pub fired: Vec<RuleFiring>,
    pub skipped: Vec<SkippedRule>,
}

impl EvaluationReport {
    pub fn empty(event: &str) -> Self {
        Self {
            event: event.to_string(),
            ..Self::default()
        }
    }

    /// Total delivery attempts across all fired rules.
    pub fn dispatch_count(&self) -> usize {
        self.fired.iter().map(|f| f.attempts.len()).sum()
    }

    pub fn fired_ids(&self) -> Vec<&str> {
        self.fired.iter().map(|f| f.rule_id.as_str()).collect()
    }

    pub fn merge(&mut self, other: EvaluationReport) {
        self.candidates += other.candidates;
        self.fired.extend(other.fired);
        self.skipped.extend(other.skipped);
    }
}

// ── Evaluator ───────────────────────────────────────────────────────

/// Matches events against rules and hands matches to the dispatcher.
///
/// Read-only with respect to rules; the only state it writes is the audit log.
pub struct RuleEvaluator {
    store: Arc<dyn RuleStore>,
    dispatcher: Arc<Dispatcher>,
    renderer: Arc<TemplateRenderer>,
    audit: Arc<AuditLog>,
}

impl RuleEvaluator {
    pub fn new(store: Arc<dyn RuleStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            renderer: Arc::new(TemplateRenderer::new()),
            audit: Arc::new(AuditLog::new()),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn store(&self) -> &Arc<dyn RuleStore> {
        &self.store
    }

    /// Evaluate immediate rules triggered by `event`.
    pub async fn evaluate_event(&self, event: &Event) -> Result<EvaluationReport, EvaluateError> {
        let rules = self.store.rules_for(&event.name, Timing::Immediate)?;
        Ok(self.evaluate_rules(event, &rules).await)
    }

    /// Evaluate scheduled rules triggered by `event`, limited to `due`.
    pub async fn evaluate_scheduled(
        &self,
        event: &Event,
        due: &HashSet<String>,
    ) -> Result<EvaluationReport, EvaluateError> {
        let rules: Vec<_> = self
            .store
            .rules_for(&event.name, Timing::Scheduled)?
            .into_iter()
            .filter(|r| due.contains(r.id()))
            .collect();
        Ok(self.evaluate_rules(event, &rules).await)
    }

    async fn evaluate_rules(&self, event: &Event, rules: &[NotificationRule]) -> EvaluationReport {
        let mut report = EvaluationReport::empty(&event.name);
        report.candidates = rules.len();

        if rules.is_empty() {
            debug!(event = %event.name, "no rules for event");
            return report;
        }

        for rule in rules {
            match self.check(rule, event) {
                Err(reason) => report.skipped.push(SkippedRule {
                    rule_id: rule.id().to_string(),
                    reason,
                }),
                Ok(false) => {}
                Ok(true) => {
                    let notification = self.render(rule, event, None);
                    let attempts = self.deliver(rule, &event.name, &notification).await;
                    report.fired.push(RuleFiring {
                        rule_id: rule.id().to_string(),
                        notification,
                        attempts,
                    });
                }
            }
        }

        info!(
            event = %event.name,
            candidates = report.candidates,
            fired = report.fired.len(),
            skipped = report.skipped.len(),
            "event evaluated"
        );
        report
    }

    /// Whether `rule` matches `event`. `Err` carries the reason the rule
    /// had to be skipped.
    pub fn check(&self, rule: &NotificationRule, event: &Event) -> Result<bool, String> {
        if !rule.is_enabled() || rule.trigger.event != event.name {
            return Ok(false);
        }
        match matches_all(&rule.conditions, &event.payload) {
            Ok(matched) => {
                self.audit.record(
                    rule.id(),
                    &event.name,
                    LogLevel::Debug,
                    ExecutionPhase::Conditions,
                    if matched { "conditions matched" } else { "conditions not met" },
                    None,
                );
                Ok(matched)
            }
            Err(e) => {
                warn!(rule_id = %rule.id(), event = %event.name, error = %e, "rule skipped: invalid condition");
                self.audit.record(
                    rule.id(),
                    &event.name,
                    LogLevel::Error,
                    ExecutionPhase::Configuration,
                    e.to_string(),
                    None,
                );
                Err(e.to_string())
            }
        }
    }

    /// Render a rule's template against the event payload, plus `extra`
    /// scope values (digest `count`). Never fails.
    pub fn render(
        &self,
        rule: &NotificationRule,
        event: &Event,
        extra: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Notification {
        let mut scope = event.payload.clone();
        if let Some(extra) = extra {
            for (k, v) in extra {
                scope.insert(k.clone(), v.clone());
            }
        }
        let title = self.renderer.render(&rule.template.title, &scope);
        let body = self.renderer.render(&rule.template.body, &scope);
        Notification::new(title, body, rule.priority)
            .with_metadata("rule_id", rule.id())
            .with_metadata("event", event.name.as_str())
    }

    /// Send a rendered notification to every channel of `rule`.
    pub async fn deliver(
        &self,
        rule: &NotificationRule,
        event_name: &str,
        notification: &Notification,
    ) -> Vec<DeliveryAttempt> {
        let attempts = self
            .dispatcher
            .dispatch(rule.id(), &rule.channels, notification)
            .await;

        let failed = attempts.iter().filter(|a| !a.success).count();
        if failed > 0 {
            warn!(
                rule_id = %rule.id(),
                event = event_name,
                channels = attempts.len(),
                failed,
                "rule dispatched with failures"
            );
        } else {
            info!(rule_id = %rule.id(), event = event_name, channels = attempts.len(), "rule dispatched");
        }

        self.audit.record(
            rule.id(),
            event_name,
            if failed > 0 { LogLevel::Warning } else { LogLevel::Info },
            ExecutionPhase::Dispatch,
            format!("sent to {} of {} channels", attempts.len() - failed, attempts.len()),
            Some(json!({ "title": notification.title, "attempts": attempts })),
        );
        attempts
    }
}
