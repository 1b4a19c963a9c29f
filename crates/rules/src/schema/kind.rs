//! Document kind enum for two-pass deserialization dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    NotificationRule,
    Channel,
    Integration,
}

impl RuleKind {
    pub const ALL: [RuleKind; 3] = [RuleKind::NotificationRule, RuleKind::Channel, RuleKind::Integration];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::NotificationRule => "NotificationRule",
            RuleKind::Channel => "Channel",
            RuleKind::Integration => "Integration",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RuleKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown document kind: '{}'", s))
    }
}
