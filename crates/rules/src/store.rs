//! Read-only access to rules for the evaluator and the sweep.

use std::sync::Arc;

use crate::loader::RuleError;
use crate::schema::{NotificationRule, Timing};

/// Source of notification rules.
///
/// Implementations return owned clones; the evaluator never mutates rules.
pub trait RuleStore: Send + Sync {
    /// Enabled rules whose trigger is exactly `event` with the given timing.
    fn rules_for(&self, event: &str, timing: Timing) -> Result<Vec<NotificationRule>, RuleError>;

    /// Every scheduled rule, enabled or not, sorted by id.
    fn scheduled_rules(&self) -> Result<Vec<NotificationRule>, RuleError>;
}

/// Fixed rule set, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRuleStore {
    rules: Arc<Vec<NotificationRule>>,
}

impl StaticRuleStore {
    pub fn new(rules: impl IntoIterator<Item = NotificationRule>) -> Self {
        let mut rules: Vec<_> = rules.into_iter().collect();
        rules.sort_by(|a, b| a.id().cmp(b.id()));
        Self { rules: Arc::new(rules) }
    }
}

impl RuleStore for StaticRuleStore {
    fn rules_for(&self, event: &str, timing: Timing) -> Result<Vec<NotificationRule>, RuleError> {
        Ok(self
            .rules
            .iter()
            .filter(|r| r.listens_to(event, timing))
            .cloned()
            .collect())
    }

    fn scheduled_rules(&self) -> Result<Vec<NotificationRule>, RuleError> {
        Ok(self
            .rules
            .iter()
            .filter(|r| r.timing() == Timing::Scheduled)
            .cloned()
            .collect())
    }
}
