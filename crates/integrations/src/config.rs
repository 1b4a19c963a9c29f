use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lifeops_core::expand::resolve_env_vars;

use crate::error::IntegrationError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// A configured external system to poll.
///
/// The last-known snapshot is deliberately absent: it belongs to the sync worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub id: String,
    pub name: String,
    /// Key into the integration registry (`docker`, `home_assistant`, ...).
    #[serde(rename = "type")]
    pub integration_type: String,
    /// Driver-specific connection settings; string values may contain `${ENV}`.
    #[serde(default)]
    pub connection: serde_json::Map<String, Value>,
    pub poll_interval: Duration,
    pub enabled: bool,
}

impl IntegrationConfig {
    pub fn new(
        id: impl Into<String>,
        integration_type: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            integration_type: integration_type.into(),
            connection: serde_json::Map::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            enabled: true,
        }
    }

    pub fn with_connection(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.connection.insert(key.into(), value.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Connection value as a string, env references resolved.
    pub fn optional(&self, key: &str) -> Result<Option<String>, IntegrationError> {
        match self.connection.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(resolve_env_vars(s)?)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(self.config_error(key, "must be a scalar")),
        }
    }

    pub fn required(&self, key: &str) -> Result<String, IntegrationError> {
        match self.optional(key)? {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(self.config_error(key, "is required")),
        }
    }

    pub fn string_list(&self, key: &str) -> Result<Vec<String>, IntegrationError> {
        match self.connection.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![resolve_env_vars(s)?]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(resolve_env_vars(s)?),
                    _ => Err(self.config_error(key, "must contain only strings")),
                })
                .collect(),
            Some(_) => Err(self.config_error(key, "must be a list of strings")),
        }
    }

    /// `base_url` with any trailing slash removed; must be http(s).
    pub fn base_url(&self) -> Result<String, IntegrationError> {
        let url = self.required("base_url")?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(self.config_error("base_url", "must start with http:// or https://"));
        }
        Ok(url.trim_end_matches('/').to_string())
    }

    fn config_error(&self, key: &str, problem: &str) -> IntegrationError {
        IntegrationError::Config(format!("integration '{}': connection.{key} {problem}", self.id))
    }
}
