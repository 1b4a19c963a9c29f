//! Document envelope for lightweight first-pass deserialization.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ChannelDocument, CommonMetadata, IntegrationDocument, NotificationRule, RuleDocument, RuleKind};

/// Reads only the header fields of a document.
///
/// Two-pass loading: extract `kind` first, then deserialize the full
/// document into the concrete type so errors name the right schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEnvelope {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    /// Remaining fields, kept for the second pass.
    #[serde(flatten)]
    pub rest: serde_yaml::Value,
}

impl RuleEnvelope {
    pub fn rule_kind(&self) -> std::result::Result<RuleKind, String> {
        self.kind.parse()
    }

    /// Second pass: rebuild the YAML and deserialize into the concrete type.
    pub fn parse_full(&self) -> std::result::Result<RuleDocument, String> {
        Ok(match self.rule_kind()? {
            RuleKind::NotificationRule => RuleDocument::Rule(self.reparse::<NotificationRule>()?),
            RuleKind::Channel => RuleDocument::Channel(self.reparse::<ChannelDocument>()?),
            RuleKind::Integration => RuleDocument::Integration(self.reparse::<IntegrationDocument>()?),
        })
    }

    fn reparse<T: DeserializeOwned>(&self) -> std::result::Result<T, String> {
        let value = serde_yaml::to_value(self).map_err(|e| e.to_string())?;
        serde_yaml::from_value(value).map_err(|e| e.to_string())
    }
}
