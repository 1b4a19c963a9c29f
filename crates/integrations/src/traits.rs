//! The polymorphic driver interface every integration type implements.

use serde::Serialize;

use crate::error::IntegrationError;
use crate::snapshot::Snapshot;

/// One configuration key a driver understands.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    /// Should be supplied through `${ENV}` rather than inline.
    pub secret: bool,
}

impl ConfigField {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: true,
            secret: false,
        }
    }

    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
            secret: false,
        }
    }

    pub const fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// Self-description of an integration type: what it polls and how to configure it.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationDescriptor {
    #[serde(rename = "type")]
    pub integration_type: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Kinds of resource the driver reports (`container`, `light`, ...).
    pub resource_kinds: Vec<&'static str>,
    pub connection: Vec<ConfigField>,
}

/// A poller for one external system.
#[async_trait::async_trait]
pub trait IntegrationDriver: Send + Sync {
    /// Verify the system is reachable and credentials are accepted.
    async fn connect(&self) -> Result<(), IntegrationError>;

    /// Fetch the current state of every resource.
    async fn poll(&self) -> Result<Snapshot, IntegrationError>;

    fn describe(&self) -> IntegrationDescriptor;
}
