//! Which scheduled rules owe a run.
//!
//! A scheduled rule follows its own cron expression, or the sweep default.
//! A cron tick is pending for a rule when it fell after the last tick the
//! rule consumed and at or before now. The sweep runs the rule, then
//! consumes the tick whether or not anything matched. A rule that has never
//! consumed a tick looks back one day, so a daemon restarted at noon still
//! sends the 08:00 digest.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use tracing::{debug, warn};

use lifeops_core::duration::parse_duration;

use crate::schema::NotificationRule;

/// Parse a cron expression. Standard five-field expressions get a leading
/// seconds field, as the `cron` crate expects six.
pub(crate) fn parse_cron(expr: &str) -> Result<Schedule, cron::error::Error> {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {expr}"))
    } else {
        Schedule::from_str(expr)
    }
}

#[derive(Debug, Default)]
struct RuleClock {
    expression: String,
    /// `None` when `expression` does not parse; the rule never runs.
    schedule: Option<Schedule>,
    cooldown: Option<Duration>,
    enabled: bool,
    consumed_at: Option<DateTime<Utc>>,
}

/// Consumed cron ticks of every scheduled rule.
#[derive(Debug, Default)]
pub struct TickLedger {
    clocks: HashMap<String, RuleClock>,
}

impl TickLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track exactly `rules`.
    ///
    /// Edits to a rule keep its consumed tick. A cron expression is parsed
    /// only when it changes, so a bad one is logged once rather than on
    /// every sweep.
    pub fn refresh(&mut self, rules: &[NotificationRule], default_cron: &str) {
        self.clocks.retain(|id, _| rules.iter().any(|r| r.id() == id));

        for rule in rules {
            let expression = rule.cron_or(default_cron).trim().to_string();
            let reparse = self
                .clocks
                .get(rule.id())
                .map_or(true, |clock| clock.expression != expression);

            let clock = self.clocks.entry(rule.id().to_string()).or_default();
            if reparse {
                clock.schedule = match parse_cron(&expression) {
                    Ok(schedule) => Some(schedule),
                    Err(e) => {
                        warn!(rule_id = %rule.id(), cron = %expression, error = %e, "invalid cron expression, rule will not run");
                        None
                    }
                };
                clock.expression = expression;
            }
            clock.cooldown = rule
                .cooldown()
                .and_then(parse_duration)
                .and_then(|d| Duration::from_std(d).ok());
            clock.enabled = rule.is_enabled();
        }
    }

    /// The cron tick `rule_id` owes at `now`, if any.
    pub fn pending_tick(&self, rule_id: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let clock = self.clocks.get(rule_id)?;
        if !clock.enabled {
            return None;
        }
        if let (Some(cooldown), Some(consumed)) = (clock.cooldown, clock.consumed_at) {
            let elapsed = now.signed_duration_since(consumed);
            if elapsed < cooldown {
                debug!(
                    rule_id = %rule_id,
                    remaining_secs = (cooldown - elapsed).num_seconds(),
                    "rule in cooldown"
                );
                return None;
            }
        }

        let since = clock.consumed_at.unwrap_or_else(|| {
            now.checked_sub_signed(Duration::hours(24))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        clock
            .schedule
            .as_ref()?
            .after(&since)
            .next()
            .filter(|tick| *tick <= now)
    }

    pub fn is_due(&self, rule_id: &str, now: DateTime<Utc>) -> bool {
        self.pending_tick(rule_id, now).is_some()
    }

    /// Rules owing a tick at `now`, sorted by id.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<&str> {
        let mut due: Vec<&str> = self
            .clocks
            .keys()
            .map(String::as_str)
            .filter(|id| self.is_due(id, now))
            .collect();
        due.sort_unstable();
        due
    }

    /// Mark the pending tick of `rule_id` as used up at `at`. Unknown ids
    /// are ignored.
    pub fn consume(&mut self, rule_id: &str, at: DateTime<Utc>) {
        if let Some(clock) = self.clocks.get_mut(rule_id) {
            clock.consumed_at = Some(at);
        }
    }

    pub fn consumed_at(&self, rule_id: &str) -> Option<DateTime<Utc>> {
        self.clocks.get(rule_id)?.consumed_at
    }

    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_CRON: &str = "0 8 * * *";

    fn rule(id: &str, cron: Option<&str>, cooldown: Option<&str>, enabled: bool) -> NotificationRule {
        let mut schedule = serde_json::Map::new();
        if let Some(cron) = cron {
            schedule.insert("cron".into(), cron.into());
        }
        if let Some(cooldown) = cooldown {
            schedule.insert("cooldown".into(), cooldown.into());
        }
        let doc = serde_json::json!({
            "apiVersion": "v1",
            "kind": "NotificationRule",
            "metadata": { "id": id, "name": id, "enabled": enabled },
            "trigger": { "event": "maintenance.due_soon", "timing": "scheduled", "schedule": schedule },
            "channels": ["phone"],
            "template": { "title": "due" },
        });
        serde_yaml::from_value(serde_yaml::to_value(doc).unwrap()).unwrap()
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn ledger(rules: &[NotificationRule]) -> TickLedger {
        let mut ledger = TickLedger::new();
        ledger.refresh(rules, DEFAULT_CRON);
        ledger
    }

    #[test]
    fn five_and_six_field_cron() {
        let five = parse_cron(" 0 8 * * * ").unwrap();
        assert_eq!(
            five.after(&at("2026-03-02T07:00:00Z")).next(),
            Some(at("2026-03-02T08:00:00Z"))
        );
        assert!(parse_cron("30 0 8 * * *").is_ok());
        assert!(parse_cron("every day").is_err());
    }

    #[test]
    fn first_sweep_looks_back_one_day() {
        let ledger = ledger(&[rule("digest", None, None, true)]);
        assert_eq!(
            ledger.pending_tick("digest", at("2026-03-02T20:00:00Z")),
            Some(at("2026-03-02T08:00:00Z"))
        );
        // Before today's tick, yesterday's is still owed.
        assert_eq!(
            ledger.pending_tick("digest", at("2026-03-02T07:00:00Z")),
            Some(at("2026-03-01T08:00:00Z"))
        );
    }

    #[test]
    fn consumed_tick_is_not_owed_again() {
        let mut ledger = ledger(&[rule("digest", None, None, true)]);
        let morning = at("2026-03-02T08:00:30Z");
        assert!(ledger.is_due("digest", morning));
        ledger.consume("digest", morning);

        assert!(!ledger.is_due("digest", at("2026-03-02T20:00:00Z")));
        assert!(ledger.is_due("digest", at("2026-03-03T08:01:00Z")));
    }

    #[test]
    fn rule_cron_overrides_default() {
        let mut ledger = ledger(&[rule("r1", Some("*/5 * * * *"), None, true)]);
        let consumed = at("2026-01-15T10:00:01Z");
        ledger.consume("r1", consumed);

        assert!(!ledger.is_due("r1", consumed + Duration::minutes(2)));
        assert_eq!(
            ledger.pending_tick("r1", consumed + Duration::minutes(5)),
            Some(at("2026-01-15T10:05:00Z"))
        );
    }

    #[test]
    fn disabled_and_unknown_rules_never_run() {
        let ledger = ledger(&[rule("off", Some("* * * * *"), None, false)]);
        assert!(!ledger.is_due("off", Utc::now()));
        assert!(!ledger.is_due("nonexistent", Utc::now()));
    }

    #[test]
    fn cooldown_outlasts_cron_ticks() {
        let mut ledger = ledger(&[rule("r1", Some("* * * * *"), Some("30m"), true)]);
        let consumed = at("2026-03-02T08:00:00Z");
        ledger.consume("r1", consumed);

        assert!(!ledger.is_due("r1", consumed + Duration::minutes(5)));
        assert!(ledger.is_due("r1", consumed + Duration::minutes(31)));
    }

    #[test]
    fn invalid_cooldown_is_ignored() {
        let mut ledger = ledger(&[rule("r1", Some("* * * * *"), Some("soon"), true)]);
        let consumed = at("2026-03-02T08:00:00Z");
        ledger.consume("r1", consumed);
        assert!(ledger.is_due("r1", consumed + Duration::seconds(61)));
    }

    #[test]
    fn invalid_cron_waits_for_a_fix() {
        let mut ledger = ledger(&[rule("r1", Some("every day"), None, true)]);
        let now = at("2026-03-02T08:00:30Z");
        assert!(!ledger.is_due("r1", now));

        ledger.refresh(&[rule("r1", Some("* * * * *"), None, true)], DEFAULT_CRON);
        assert!(ledger.is_due("r1", now));
    }

    #[test]
    fn refresh_tracks_rule_set() {
        let mut ledger = TickLedger::new();
        assert!(ledger.is_empty());

        ledger.refresh(
            &[
                rule("r1", Some("* * * * *"), None, true),
                rule("r2", Some("*/5 * * * *"), Some("10m"), true),
            ],
            DEFAULT_CRON,
        );
        assert_eq!(ledger.len(), 2);

        ledger.refresh(&[rule("r1", Some("* * * * *"), None, true)], DEFAULT_CRON);
        assert_eq!(ledger.len(), 1);
        assert!(!ledger.is_due("r2", Utc::now()));
    }

    #[test]
    fn edits_keep_consumed_tick() {
        let mut ledger = ledger(&[rule("r1", Some("* * * * *"), None, true)]);
        let consumed = at("2026-03-02T08:00:00Z");
        ledger.consume("r1", consumed);

        ledger.refresh(&[rule("r1", Some("*/5 * * * *"), Some("1h"), true)], DEFAULT_CRON);
        assert_eq!(ledger.consumed_at("r1"), Some(consumed));
        // The new cooldown applies to the old consumed tick.
        assert!(!ledger.is_due("r1", consumed + Duration::minutes(30)));
        assert!(ledger.is_due("r1", consumed + Duration::minutes(61)));
    }

    #[test]
    fn due_is_sorted_subset() {
        let mut ledger = ledger(&[
            rule("zeta", Some("* * * * *"), None, true),
            rule("always", Some("* * * * *"), None, true),
            rule("disabled", Some("* * * * *"), None, false),
            rule("cooldown", Some("* * * * *"), Some("1h"), true),
        ]);
        let now = at("2026-03-02T08:00:00Z");
        ledger.consume("cooldown", now);

        assert_eq!(ledger.due(now + Duration::seconds(90)), vec!["always", "zeta"]);
    }

    #[test]
    fn consume_unknown_rule_is_noop() {
        let mut ledger = TickLedger::new();
        ledger.consume("nonexistent", Utc::now());
        assert!(ledger.is_empty());
        assert_eq!(ledger.consumed_at("nonexistent"), None);
    }
}
