//! Portainer: containers of one Docker environment through Portainer's API proxy.

use crate::config::IntegrationConfig;
use crate::drivers::docker::{containers_to_snapshot, read_json, ContainerSummary};
use crate::error::IntegrationError;
use crate::snapshot::Snapshot;
use crate::traits::{ConfigField, IntegrationDescriptor, IntegrationDriver};

pub const TYPE: &str = "portainer";

const API_KEY_HEADER: &str = "X-API-Key";

pub struct PortainerDriver {
    base_url: String,
    api_key: String,
    endpoint_id: u32,
    client: reqwest::Client,
}

impl PortainerDriver {
    pub fn from_config(config: &IntegrationConfig, client: &reqwest::Client) -> Result<Self, IntegrationError> {
        let endpoint_id = match config.optional("endpoint_id")? {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                IntegrationError::Config(format!(
                    "integration '{}': connection.endpoint_id must be a number, got '{raw}'",
                    config.id
                ))
            })?,
            None => 1,
        };

        Ok(Self {
            base_url: config.base_url()?,
            api_key: config.required("api_key")?,
            endpoint_id,
            client: client.clone(),
        })
    }

    pub fn descriptor() -> IntegrationDescriptor {
        IntegrationDescriptor {
            integration_type: TYPE,
            display_name: "Portainer",
            description: "Container state of one Portainer environment",
            resource_kinds: vec!["container"],
            connection: vec![
                ConfigField::required("base_url", "Portainer URL, e.g. https://portainer.local:9443"),
                ConfigField::required("api_key", "Portainer access token").secret(),
                ConfigField::optional("endpoint_id", "Environment id (default 1)"),
            ],
        }
    }

    fn containers_url(&self) -> String {
        format!(
            "{}/api/endpoints/{}/docker/containers/json?all=1",
            self.base_url, self.endpoint_id
        )
    }
}

#[async_trait::async_trait]
impl IntegrationDriver for PortainerDriver {
    async fn connect(&self) -> Result<(), IntegrationError> {
        let response = self
            .client
            .get(format!("{}/api/endpoints/{}", self.base_url, self.endpoint_id))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let _: serde_json::Value = read_json(TYPE, response).await?;
        Ok(())
    }

    async fn poll(&self) -> Result<Snapshot, IntegrationError> {
        let response = self
            .client
            .get(self.containers_url())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let containers: Vec<ContainerSummary> = read_json(TYPE, response).await?;
        tracing::debug!(
            endpoint_id = self.endpoint_id,
            containers = containers.len(),
            "portainer poll"
        );
        Ok(containers_to_snapshot(containers))
    }

    fn describe(&self) -> IntegrationDescriptor {
        Self::descriptor()
    }
}
