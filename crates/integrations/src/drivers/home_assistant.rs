//! Home Assistant REST API (`/api/states`) with a long-lived access token.

use serde::Deserialize;
use serde_json::Value;

use crate::config::IntegrationConfig;
use crate::drivers::docker::read_json;
use crate::error::IntegrationError;
use crate::snapshot::{ResourceState, Snapshot};
use crate::traits::{ConfigField, IntegrationDescriptor, IntegrationDriver};

pub const TYPE: &str = "home_assistant";

#[derive(Debug, Deserialize)]
struct EntityState {
    entity_id: String,
    state: String,
    #[serde(default)]
    attributes: serde_json::Map<String, Value>,
}

/// Which entities to keep. Empty filters keep everything.
#[derive(Debug, Default)]
struct EntityFilter {
    entities: Vec<String>,
    domains: Vec<String>,
}

impl EntityFilter {
    fn keeps(&self, entity_id: &str) -> bool {
        if self.entities.is_empty() && self.domains.is_empty() {
            return true;
        }
        self.entities.iter().any(|e| e == entity_id)
            || self.domains.iter().any(|d| domain_of(entity_id) == d)
    }
}

fn domain_of(entity_id: &str) -> &str {
    entity_id.split('.').next().unwrap_or(entity_id)
}

fn states_to_snapshot(states: Vec<EntityState>, filter: &EntityFilter) -> Snapshot {
    states
        .into_iter()
        .filter(|s| filter.keeps(&s.entity_id))
        .map(|s| {
            let name = s
                .attributes
                .get("friendly_name")
                .and_then(|v| v.as_str())
                .unwrap_or(s.entity_id.as_str())
                .to_string();
            let state = ResourceState {
                kind: domain_of(&s.entity_id).to_string(),
                name,
                status: s.state,
                attributes: s.attributes,
            };
            (s.entity_id, state)
        })
        .collect()
}

pub struct HomeAssistantDriver {
    base_url: String,
    token: String,
    filter: EntityFilter,
    client: reqwest::Client,
}

impl HomeAssistantDriver {
    pub fn from_config(config: &IntegrationConfig, client: &reqwest::Client) -> Result<Self, IntegrationError> {
        Ok(Self {
            base_url: config.base_url()?,
            token: config.required("token")?,
            filter: EntityFilter {
                entities: config.string_list("entities")?,
                domains: config.string_list("domains")?,
            },
            client: client.clone(),
        })
    }

    pub fn descriptor() -> IntegrationDescriptor {
        IntegrationDescriptor {
            integration_type: TYPE,
            display_name: "Home Assistant",
            description: "Entity states from a Home Assistant instance",
            resource_kinds: vec!["light", "switch", "sensor", "binary_sensor", "climate", "lock"],
            connection: vec![
                ConfigField::required("base_url", "Home Assistant URL, e.g. http://homeassistant.local:8123"),
                ConfigField::required("token", "Long-lived access token").secret(),
                ConfigField::optional("entities", "Entity ids to track"),
                ConfigField::optional("domains", "Entity domains to track, e.g. [light, lock]"),
            ],
        }
    }
}

#[async_trait::async_trait]
impl IntegrationDriver for HomeAssistantDriver {
    async fn connect(&self) -> Result<(), IntegrationError> {
        let response = self
            .client
            .get(format!("{}/api/", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let _: Value = read_json(TYPE, response).await?;
        Ok(())
    }

    async fn poll(&self) -> Result<Snapshot, IntegrationError> {
        let response = self
            .client
            .get(format!("{}/api/states", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let states: Vec<EntityState> = read_json(TYPE, response).await?;
        let total = states.len();
        let snapshot = states_to_snapshot(states, &self.filter);
        tracing::debug!(total, tracked = snapshot.len(), "home assistant poll");
        Ok(snapshot)
    }

    fn describe(&self) -> IntegrationDescriptor {
        Self::descriptor()
    }
}
