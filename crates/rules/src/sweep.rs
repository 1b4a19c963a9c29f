//! The scheduled sweep.
//!
//! On each tick the sweep re-reads every scheduled rule, asks the
//! [`TickLedger`] which owe a cron tick, and only then queries its
//! [`SweepSource`]s for synthesized events. Those events go through the same
//! matching, rendering and dispatch path as emitted events, restricted to the
//! due rules. Digest rules batch all of their matches into one message.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use lifeops_core::Event;

use crate::audit_log::{ExecutionPhase, LogLevel};
use crate::bus::panic_message;
use crate::evaluator::{RuleEvaluator, RuleFiring, SkippedRule};
use crate::loader::RuleError;
use crate::schema::NotificationRule;
use crate::ticks::TickLedger;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("rule store unavailable: {0}")]
    Store(#[from] RuleError),

    #[error("{0}")]
    Source(String),
}

/// Synthesizes events from domain state for scheduled rules.
#[async_trait::async_trait]
pub trait SweepSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn collect(&self, now: DateTime<Utc>) -> Result<Vec<Event>, SweepError>;
}

/// What one sweep did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub started_at: Option<DateTime<Utc>>,
    /// Rules whose cron tick arrived, sorted.
    pub due: Vec<String>,
    pub events: usize,
    pub failed_sources: Vec<String>,
    pub fired: Vec<RuleFiring>,
    pub skipped: Vec<SkippedRule>,
}

impl SweepReport {
    pub fn fired_ids(&self) -> Vec<&str> {
        self.fired.iter().map(|f| f.rule_id.as_str()).collect()
    }
}

pub struct ScheduledSweep {
    evaluator: Arc<RuleEvaluator>,
    sources: Vec<Arc<dyn SweepSource>>,
    ledger: Mutex<TickLedger>,
    default_cron: String,
    tick: Duration,
}

impl ScheduledSweep {
    pub fn new(evaluator: Arc<RuleEvaluator>, default_cron: impl Into<String>, tick: Duration) -> Self {
        Self {
            evaluator,
            sources: Vec::new(),
            ledger: Mutex::new(TickLedger::new()),
            default_cron: default_cron.into(),
            tick,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn SweepSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Run one sweep as of `now`.
    ///
    /// # Errors
    ///
    /// Only when the rule store cannot list scheduled rules. Source and
    /// delivery failures are logged and reported, never returned.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        let rules = self.evaluator.store().scheduled_rules()?;
        let mut ledger = self.ledger.lock().await;
        ledger.refresh(&rules, &self.default_cron);

        let due: Vec<String> = ledger.due(now).into_iter().map(String::from).collect();
        let mut report = SweepReport {
            started_at: Some(now),
            due: due.clone(),
            ..SweepReport::default()
        };
        if due.is_empty() {
            debug!(scheduled = rules.len(), "sweep: no rules due");
            return Ok(report);
        }

        let events = self.collect_events(now, &mut report).await;
        report.events = events.len();

        let due_rules: Vec<&NotificationRule> =
            rules.iter().filter(|r| due.iter().any(|id| id == r.id())).collect();
        let per_event: HashSet<String> = due_rules
            .iter()
            .filter(|r| !r.trigger.digest)
            .map(|r| r.id().to_string())
            .collect();

        if !per_event.is_empty() {
            for event in &events {
                match self.evaluator.evaluate_scheduled(event, &per_event).await {
                    Ok(evaluation) => {
                        report.fired.extend(evaluation.fired);
                        report.skipped.extend(evaluation.skipped);
                    }
                    Err(e) => warn!(event = %event.name, error = %e, "sweep evaluation failed"),
                }
            }
        }

        for rule in due_rules.iter().filter(|r| r.trigger.digest) {
            match self.digest(rule, &events).await {
                Ok(Some(firing)) => report.fired.push(firing),
                Ok(None) => {}
                Err(reason) => report.skipped.push(SkippedRule {
                    rule_id: rule.id().to_string(),
                    reason,
                }),
            }
        }

        // Every due rule consumes its tick, matched or not.
        for id in &due {
            ledger.consume(id, now);
            let fired = report.fired.iter().filter(|f| &f.rule_id == id).count();
            self.evaluator.audit_log().record(
                id,
                "sweep",
                LogLevel::Info,
                ExecutionPhase::Schedule,
                format!("due; {} events collected, {fired} notifications", report.events),
                None,
            );
        }

        info!(
            due = due.len(),
            events = report.events,
            fired = report.fired.len(),
            skipped = report.skipped.len(),
            failed_sources = report.failed_sources.len(),
            "sweep complete"
        );
        Ok(report)
    }

    async fn collect_events(&self, now: DateTime<Utc>, report: &mut SweepReport) -> Vec<Event> {
        let mut events = Vec::new();
        for source in &self.sources {
            match source.collect(now).await {
                Ok(collected) => {
                    debug!(source = source.name(), events = collected.len(), "sweep source collected");
                    events.extend(collected);
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "sweep source failed, skipping");
                    report.failed_sources.push(source.name().to_string());
                }
            }
        }
        events
    }

    /// One message for every match of a digest rule in this sweep.
    async fn digest(&self, rule: &NotificationRule, events: &[Event]) -> Result<Option<RuleFiring>, String> {
        let mut matched = Vec::new();
        for event in events {
            if self.evaluator.check(rule, event)? {
                matched.push(event);
            }
        }
        let Some(first) = matched.first() else {
            return Ok(None);
        };

        let mut scope = serde_json::Map::new();
        scope.insert("count".to_string(), json!(matched.len()));
        let mut notification = self.evaluator.render(rule, first, Some(&scope));
        notification.body = matched
            .iter()
            .map(|event| self.evaluator.render(rule, event, Some(&scope)).body)
            .collect::<Vec<_>>()
            .join("\n");

        let attempts = self.evaluator.deliver(rule, &first.name, &notification).await;
        Ok(Some(RuleFiring {
            rule_id: rule.id().to_string(),
            notification,
            attempts,
        }))
    }

    /// Sweep on every tick until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            tick_secs = self.tick.as_secs(),
            sources = ?self.source_names(),
            default_cron = %self.default_cron,
            "scheduled sweep started"
        );
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match AssertUnwindSafe(self.run_once(Utc::now())).catch_unwind().await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!(error = %e, "sweep failed"),
                        Err(panic) => error!(panic = %panic_message(panic.as_ref()), "sweep panicked, next tick continues"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduled sweep stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use lifeops_core::payload_from_json;
    use lifeops_notify::{ChannelRegistry, ChannelSpec, Dispatcher, Notification, Notifier, NotifyError, StaticChannelStore};

    use super::*;
    use crate::store::StaticRuleStore;

    struct Outbox {
        sent: Arc<std::sync::Mutex<Vec<Notification>>>,
    }

    #[async_trait::async_trait]
    impl Notifier for Outbox {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
        fn channel_name(&self) -> &str {
            "outbox"
        }
    }

    struct FixedSource {
        events: Vec<Event>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl SweepSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn collect(&self, _now: DateTime<Utc>) -> Result<Vec<Event>, SweepError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.events.clone())
        }
    }

    struct BrokenSource;

    #[async_trait::async_trait]
    impl SweepSource for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }
        async fn collect(&self, _now: DateTime<Utc>) -> Result<Vec<Event>, SweepError> {
            Err(SweepError::Source("export unreadable".into()))
        }
    }

    fn due_soon(vehicle: &str, service: &str) -> Event {
        Event::new(
            "maintenance.due_soon",
            payload_from_json(json!({"vehicle_name": vehicle, "service_type": service, "days_remaining": 5})),
        )
    }

    fn scheduled_rule(id: &str, cron: &str, digest: bool) -> NotificationRule {
        serde_yaml::from_str(&format!(
            r#"
apiVersion: v1
kind: NotificationRule
metadata: {{ id: {id}, name: {id} }}
trigger:
  event: maintenance.due_soon
  timing: scheduled
  digest: {digest}
  schedule: {{ cron: "{cron}" }}
channels: [phone]
template:
  title: "{{{{count}}}} services due"
  body: "{{{{vehicle_name}}}}: {{{{service_type}}}}"
"#
        ))
        .unwrap()
    }

    struct Harness {
        sweep: ScheduledSweep,
        sent: Arc<std::sync::Mutex<Vec<Notification>>>,
        source_calls: Arc<AtomicUsize>,
    }

    fn harness(rules: Vec<NotificationRule>, events: Vec<Event>) -> Harness {
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));
        let outbox = Arc::clone(&sent);
        let mut registry = ChannelRegistry::new();
        registry.register("outbox", move |_, _| Ok(Box::new(Outbox { sent: Arc::clone(&outbox) })));
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            Arc::new(StaticChannelStore::new([ChannelSpec::new("phone", "outbox")])),
        ));
        let evaluator = Arc::new(RuleEvaluator::new(Arc::new(StaticRuleStore::new(rules)), dispatcher));
        let source_calls = Arc::new(AtomicUsize::new(0));
        let sweep = ScheduledSweep::new(evaluator, "0 8 * * *", Duration::from_secs(60))
            .with_source(Arc::new(BrokenSource))
            .with_source(Arc::new(FixedSource {
                events,
                calls: Arc::clone(&source_calls),
            }));
        Harness { sweep, sent, source_calls }
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn fires_each_match_once_per_tick() {
        let h = harness(
            vec![scheduled_rule("each", "0 8 * * *", false)],
            vec![due_soon("Tacoma", "Oil Change"), due_soon("Civic", "Tires")],
        );

        let report = h.sweep.run_once(at("2026-03-02T08:00:10Z")).await.unwrap();
        assert_eq!(report.due, vec!["each"]);
        assert_eq!(report.events, 2);
        assert_eq!(report.failed_sources, vec!["broken"]);
        assert_eq!(report.fired.len(), 2);
        assert_eq!(h.sent.lock().unwrap()[0].body, "Tacoma: Oil Change");

        // Same tick again: nothing due, sources untouched.
        let again = h.sweep.run_once(at("2026-03-02T08:05:00Z")).await.unwrap();
        assert!(again.due.is_empty());
        assert_eq!(h.source_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn digest_batches_matches() {
        let h = harness(
            vec![scheduled_rule("daily", "0 8 * * *", true)],
            vec![due_soon("Tacoma", "Oil Change"), due_soon("Civic", "Tires")],
        );

        let report = h.sweep.run_once(at("2026-03-02T08:00:10Z")).await.unwrap();
        assert_eq!(report.fired_ids(), vec!["daily"]);

        let sent = h.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "2 services due");
        assert_eq!(sent[0].body, "Tacoma: Oil Change\nCivic: Tires");
    }

    #[tokio::test]
    async fn digest_without_matches_sends_nothing_but_consumes_tick() {
        let h = harness(vec![scheduled_rule("daily", "0 8 * * *", true)], vec![]);

        let report = h.sweep.run_once(at("2026-03-02T08:00:10Z")).await.unwrap();
        assert_eq!(report.due, vec!["daily"]);
        assert!(report.fired.is_empty());
        assert!(h.sent.lock().unwrap().is_empty());
        let entry = h.sweep.evaluator.audit_log().latest("daily").unwrap();
        assert_eq!(entry.phase, ExecutionPhase::Schedule);

        let later = h.sweep.run_once(at("2026-03-02T09:00:00Z")).await.unwrap();
        assert!(later.due.is_empty());
    }

    #[tokio::test]
    async fn nothing_due_skips_sources() {
        let h = harness(
            vec![scheduled_rule("daily", "0 8 * * *", false)],
            vec![due_soon("Tacoma", "Oil Change")],
        );
        h.sweep.run_once(at("2026-03-02T08:00:10Z")).await.unwrap();

        let report = h.sweep.run_once(at("2026-03-02T12:00:00Z")).await.unwrap();
        assert!(report.due.is_empty());
        assert_eq!(report.events, 0);
        assert_eq!(h.source_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn immediate_rules_never_fire_from_sweep() {
        let immediate: NotificationRule = serde_yaml::from_str(
            r#"
apiVersion: v1
kind: NotificationRule
metadata: { id: now, name: now }
trigger: { event: maintenance.due_soon }
channels: [phone]
template: { title: "{{service_type}}" }
"#,
        )
        .unwrap();
        let h = harness(vec![immediate], vec![due_soon("Tacoma", "Oil Change")]);

        let report = h.sweep.run_once(at("2026-03-02T08:00:10Z")).await.unwrap();
        assert!(report.due.is_empty());
        assert!(h.sent.lock().unwrap().is_empty());
        assert_eq!(h.source_calls.load(Ordering::SeqCst), 0);
    }

    struct PanickingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl SweepSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }
        async fn collect(&self, _now: DateTime<Utc>) -> Result<Vec<Event>, SweepError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("export exploded")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_source_does_not_stop_the_loop() {
        let h = harness(vec![scheduled_rule("every", "* * * * *", false)], vec![]);
        let calls = Arc::new(AtomicUsize::new(0));
        let sweep = Arc::new(
            ScheduledSweep::new(Arc::clone(&h.sweep.evaluator), "0 8 * * *", Duration::from_secs(60))
                .with_source(Arc::new(PanickingSource { calls: Arc::clone(&calls) })),
        );
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn({
            let sweep = Arc::clone(&sweep);
            async move { sweep.run(rx).await }
        });

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(calls.load(Ordering::SeqCst) >= 2, "loop kept ticking after a panic");
        assert!(!task.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let h = harness(vec![], vec![]);
        let (tx, rx) = watch::channel(false);
        let sweep = Arc::new(h.sweep);
        let task = tokio::spawn({
            let sweep = Arc::clone(&sweep);
            async move { sweep.run(rx).await }
        });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
