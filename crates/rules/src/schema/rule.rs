//! Notification rule documents.

use serde::{Deserialize, Serialize};

use lifeops_notify::Priority;

use super::{CommonMetadata, Condition};

/// `kind: NotificationRule`: an event trigger, conditions, channels and a
/// message template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NotificationRule {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    pub trigger: Trigger,
    /// ANDed together; an empty list always matches.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub channels: Vec<String>,
    pub template: MessageTemplate,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Trigger {
    /// Compared for exact equality with the event name.
    pub event: String,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSpec>,
    /// Scheduled rules only: one message per sweep for all matches.
    #[serde(default)]
    pub digest: bool,
}

/// When a rule is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    /// At emit time, inline with the producer.
    #[default]
    Immediate,
    /// By the scheduled sweep, against synthesized events.
    Scheduled,
}

impl std::fmt::Display for Timing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timing::Immediate => f.write_str("immediate"),
            Timing::Scheduled => f.write_str("scheduled"),
        }
    }
}

/// Cron (5-field, UTC) plus optional cooldown (`30m`, `12h`, `1d`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScheduleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MessageTemplate {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl NotificationRule {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn is_enabled(&self) -> bool {
        self.metadata.enabled
    }

    pub fn timing(&self) -> Timing {
        self.trigger.timing
    }

    /// The rule's cron expression, or `default` when it has none.
    pub fn cron_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.trigger
            .schedule
            .as_ref()
            .and_then(|s| s.cron.as_deref())
            .unwrap_or(default)
    }

    pub fn cooldown(&self) -> Option<&str> {
        self.trigger.schedule.as_ref().and_then(|s| s.cooldown.as_deref())
    }

    /// Enabled, triggered by `event`, evaluated with `timing`.
    pub fn listens_to(&self, event: &str, timing: Timing) -> bool {
        self.is_enabled() && self.trigger.timing == timing && self.trigger.event == event
    }
}
