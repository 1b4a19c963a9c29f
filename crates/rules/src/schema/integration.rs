//! Integration documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lifeops_core::duration::parse_duration;
use lifeops_integrations::{IntegrationConfig, DEFAULT_POLL_INTERVAL};

use super::CommonMetadata;

/// `kind: Integration`: an external system the sync worker polls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IntegrationDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    #[serde(rename = "type")]
    pub integration_type: String,
    #[serde(default)]
    pub connection: serde_json::Map<String, Value>,
    /// Duration string (`30s`, `5m`); 60s when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
}

impl IntegrationDocument {
    pub fn to_config(&self) -> Result<IntegrationConfig, String> {
        let poll_interval = match self.poll_interval.as_deref() {
            None => DEFAULT_POLL_INTERVAL,
            Some(raw) => parse_duration(raw)
                .filter(|d| !d.is_zero())
                .ok_or_else(|| format!("invalid poll_interval '{raw}'"))?,
        };
        Ok(IntegrationConfig {
            id: self.metadata.id.clone(),
            name: self.metadata.name.clone(),
            integration_type: self.integration_type.clone(),
            connection: self.connection.clone(),
            poll_interval,
            enabled: self.metadata.enabled,
        })
    }
}
