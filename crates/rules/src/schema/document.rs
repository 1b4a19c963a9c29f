//! Multi-kind document container and accessors.

use super::{ChannelDocument, CommonMetadata, IntegrationDocument, NotificationRule, RuleKind};

/// A fully deserialized document of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleDocument {
    Rule(NotificationRule),
    Channel(ChannelDocument),
    Integration(IntegrationDocument),
}

impl RuleDocument {
    pub fn metadata(&self) -> &CommonMetadata {
        match self {
            RuleDocument::Rule(r) => &r.metadata,
            RuleDocument::Channel(c) => &c.metadata,
            RuleDocument::Integration(i) => &i.metadata,
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata().id
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            RuleDocument::Rule(_) => RuleKind::NotificationRule,
            RuleDocument::Channel(_) => RuleKind::Channel,
            RuleDocument::Integration(_) => RuleKind::Integration,
        }
    }

    pub fn as_rule(&self) -> Option<&NotificationRule> {
        match self {
            RuleDocument::Rule(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelDocument> {
        match self {
            RuleDocument::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_integration(&self) -> Option<&IntegrationDocument> {
        match self {
            RuleDocument::Integration(i) => Some(i),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            RuleDocument::Rule(r) => serde_json::to_value(r),
            RuleDocument::Channel(c) => serde_json::to_value(c),
            RuleDocument::Integration(i) => serde_json::to_value(i),
        }
    }

    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        match self {
            RuleDocument::Rule(r) => serde_yaml::to_string(r),
            RuleDocument::Channel(c) => serde_yaml::to_string(c),
            RuleDocument::Integration(i) => serde_yaml::to_string(i),
        }
    }
}
