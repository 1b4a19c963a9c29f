//! Integration type registry.
//!
//! Built once at startup and shared by `Arc`; every lookup goes through an
//! explicit instance, so tests can register mock drivers without touching
//! global state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::IntegrationConfig;
use crate::drivers::{docker, home_assistant, portainer};
use crate::drivers::{DockerDriver, HomeAssistantDriver, PortainerDriver};
use crate::error::IntegrationError;
use crate::traits::{IntegrationDescriptor, IntegrationDriver};

/// Builds a driver for one configured integration.
pub type DriverConstructor = Arc<
    dyn Fn(&IntegrationConfig, &reqwest::Client) -> Result<Box<dyn IntegrationDriver>, IntegrationError>
        + Send
        + Sync,
>;

/// Produces the descriptor (configuration schema) of one integration type.
pub type SchemaProvider =
    Arc<dyn Fn() -> Result<IntegrationDescriptor, IntegrationError> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    constructor: DriverConstructor,
    schema: SchemaProvider,
}

/// Maps integration type strings to driver constructors.
#[derive(Clone, Default)]
pub struct IntegrationRegistry {
    types: BTreeMap<String, Registration>,
}

impl IntegrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with docker, home_assistant and portainer registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            docker::TYPE,
            |cfg, client| Ok(Box::new(DockerDriver::from_config(cfg, client)?)),
            || Ok(DockerDriver::descriptor()),
        );
        registry.register(
            home_assistant::TYPE,
            |cfg, client| Ok(Box::new(HomeAssistantDriver::from_config(cfg, client)?)),
            || Ok(HomeAssistantDriver::descriptor()),
        );
        registry.register(
            portainer::TYPE,
            |cfg, client| Ok(Box::new(PortainerDriver::from_config(cfg, client)?)),
            || Ok(PortainerDriver::descriptor()),
        );
        registry
    }

    /// Register (or replace) an integration type.
    pub fn register<C, S>(&mut self, integration_type: impl Into<String>, constructor: C, schema: S)
    where
        C: Fn(&IntegrationConfig, &reqwest::Client) -> Result<Box<dyn IntegrationDriver>, IntegrationError>
            + Send
            + Sync
            + 'static,
        S: Fn() -> Result<IntegrationDescriptor, IntegrationError> + Send + Sync + 'static,
    {
        self.types.insert(
            integration_type.into(),
            Registration {
                constructor: Arc::new(constructor),
                schema: Arc::new(schema),
            },
        );
    }

    /// Constructor for a type, or `None` if the type is unknown.
    pub fn get_class(&self, integration_type: &str) -> Option<DriverConstructor> {
        self.types
            .get(integration_type)
            .map(|r| Arc::clone(&r.constructor))
    }

    pub fn contains(&self, integration_type: &str) -> bool {
        self.types.contains_key(integration_type)
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    /// Build a driver for a configured integration.
    pub fn create(
        &self,
        config: &IntegrationConfig,
        client: &reqwest::Client,
    ) -> Result<Box<dyn IntegrationDriver>, IntegrationError> {
        let constructor = self
            .get_class(&config.integration_type)
            .ok_or_else(|| IntegrationError::UnknownType(config.integration_type.clone()))?;
        constructor(config, client)
    }

    /// Descriptors of every registered type, sorted by type.
    ///
    /// A type whose schema cannot be produced is logged and left out; the
    /// others are still returned.
    pub fn get_all_schemas(&self) -> Vec<IntegrationDescriptor> {
        self.types
            .iter()
            .filter_map(|(name, registration)| match (registration.schema)() {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    tracing::warn!(integration_type = %name, error = %e, "integration schema unavailable");
                    None
                }
            })
            .collect()
    }
}

impl fmt::Debug for IntegrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationRegistry")
            .field("types", &self.types())
            .finish()
    }
}
