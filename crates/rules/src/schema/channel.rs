//! Channel documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lifeops_notify::ChannelSpec;

use super::CommonMetadata;

/// `kind: Channel`: a delivery target shared by many rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChannelDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    pub driver: String,
    /// Driver-specific; `${ENV}` references resolve when the driver is built.
    #[serde(default)]
    pub config: serde_json::Map<String, Value>,
}

impl ChannelDocument {
    pub fn to_spec(&self) -> ChannelSpec {
        ChannelSpec {
            id: self.metadata.id.clone(),
            name: self.metadata.name.clone(),
            driver: self.driver.clone(),
            config: self.config.clone(),
            enabled: self.metadata.enabled,
        }
    }
}
