//! Docker Engine HTTP API (TCP endpoint).

use serde::Deserialize;
use serde_json::json;

use crate::config::IntegrationConfig;
use crate::error::IntegrationError;
use crate::snapshot::{ResourceState, Snapshot};
use crate::traits::{ConfigField, IntegrationDescriptor, IntegrationDriver};

pub const TYPE: &str = "docker";

/// Subset of `GET /containers/json` we care about. Shared with portainer,
/// which proxies the same endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContainerSummary {
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub state: String,
    /// Human-readable status, e.g. "Up 3 hours".
    #[serde(default)]
    pub status: String,
}

/// Build a snapshot keyed by container id.
pub(crate) fn containers_to_snapshot(containers: Vec<ContainerSummary>) -> Snapshot {
    containers
        .into_iter()
        .map(|c| {
            let name = c
                .names
                .first()
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| c.id.chars().take(12).collect());
            let state = ResourceState::new("container", name, c.state.to_lowercase())
                .with_attribute("image", json!(c.image))
                .with_attribute("status_text", json!(c.status));
            (c.id, state)
        })
        .collect()
}

/// Read a JSON body, classifying non-2xx statuses.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    service: &str,
    response: reqwest::Response,
) -> Result<T, IntegrationError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(IntegrationError::from_status(service, status, &body));
    }
    response.json::<T>().await.map_err(|e| IntegrationError::Protocol {
        service: service.to_string(),
        detail: e.to_string(),
    })
}

pub struct DockerDriver {
    base_url: String,
    client: reqwest::Client,
}

impl DockerDriver {
    /// Connection keys: `base_url` (e.g. `http://nas.local:2375`).
    pub fn from_config(config: &IntegrationConfig, client: &reqwest::Client) -> Result<Self, IntegrationError> {
        Ok(Self {
            base_url: config.base_url()?,
            client: client.clone(),
        })
    }

    pub fn descriptor() -> IntegrationDescriptor {
        IntegrationDescriptor {
            integration_type: TYPE,
            display_name: "Docker Engine",
            description: "Container state from a Docker daemon exposed over TCP",
            resource_kinds: vec!["container"],
            connection: vec![ConfigField::required(
                "base_url",
                "Docker API endpoint, e.g. http://nas.local:2375",
            )],
        }
    }
}

#[async_trait::async_trait]
impl IntegrationDriver for DockerDriver {
    async fn connect(&self) -> Result<(), IntegrationError> {
        let response = self
            .client
            .get(format!("{}/_ping", self.base_url))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(IntegrationError::from_status(TYPE, status, ""))
        }
    }

    async fn poll(&self) -> Result<Snapshot, IntegrationError> {
        let response = self
            .client
            .get(format!("{}/containers/json?all=true", self.base_url))
            .send()
            .await?;
        let containers: Vec<ContainerSummary> = read_json(TYPE, response).await?;
        tracing::debug!(base_url = %self.base_url, containers = containers.len(), "docker poll");
        Ok(containers_to_snapshot(containers))
    }

    fn describe(&self) -> IntegrationDescriptor {
        Self::descriptor()
    }
}
