//! Channel definitions and the channel driver registry.
//!
//! A [`ChannelSpec`] is a configured delivery target (driver + opaque config
//! map). The [`ChannelRegistry`] maps driver names to constructors that turn a
//! spec into a live [`Notifier`]. Channel lookup goes through the
//! [`ChannelStore`] seam so the dispatcher never owns channel configuration.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lifeops_core::expand::resolve_env_vars;

use crate::discord::DiscordNotifier;
use crate::email::EmailNotifier;
use crate::ntfy::NtfyNotifier;
use crate::pushover::PushoverNotifier;
use crate::telegram::TelegramNotifier;
use crate::templating::TemplateRenderer;
use crate::traits::{Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

// ── Channel spec ────────────────────────────────────────────────────

/// A configured delivery target referenced by rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub id: String,
    pub name: String,
    /// Key into the [`ChannelRegistry`].
    pub driver: String,
    /// Driver-specific settings. String values may contain `${ENV}` references.
    #[serde(default)]
    pub config: serde_json::Map<String, Value>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl ChannelSpec {
    pub fn new(id: impl Into<String>, driver: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            driver: driver.into(),
            config: serde_json::Map::new(),
            enabled: true,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Config value as a string with env references resolved.
    /// Numbers and booleans are stringified.
    pub fn optional(&self, key: &str) -> Result<Option<String>, NotifyError> {
        match self.config.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(resolve_env_vars(s)?)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(self.config_error(key, "must be a scalar")),
        }
    }

    /// Like [`optional`](Self::optional), but missing or empty values are errors.
    pub fn required(&self, key: &str) -> Result<String, NotifyError> {
        match self.optional(key)? {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(self.config_error(key, "is required")),
        }
    }

    /// A list of strings. A single string is accepted as a one-element list.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, NotifyError> {
        match self.config.get(key) {
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

    /// A string-to-string map (e.g., HTTP headers).
    pub fn string_map(&self, key: &str) -> Result<HashMap<String, String>, NotifyError> {
        match self.config.get(key) {
            None | Some(Value::Null) => Ok(HashMap::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), resolve_env_vars(s)?)),
                    other => Ok((k.clone(), other.to_string())),
                })
                .collect(),
            Some(_) => Err(self.config_error(key, "must be a mapping")),
        }
    }

    fn config_error(&self, key: &str, problem: &str) -> NotifyError {
        NotifyError::Config(format!("channel '{}': config.{key} {problem}", self.id))
    }
}

// ── Channel store seam ──────────────────────────────────────────────

/// Read access to configured channels.
pub trait ChannelStore: Send + Sync {
    /// Look up a channel by id. `Ok(None)` means the id is not configured.
    fn channel(&self, id: &str) -> Result<Option<ChannelSpec>, NotifyError>;
}

/// Fixed in-memory channel set.
#[derive(Debug, Default, Clone)]
pub struct StaticChannelStore {
    channels: HashMap<String, ChannelSpec>,
}

impl StaticChannelStore {
    pub fn new(channels: impl IntoIterator<Item = ChannelSpec>) -> Self {
        Self {
            channels: channels.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }
}

impl ChannelStore for StaticChannelStore {
    fn channel(&self, id: &str) -> Result<Option<ChannelSpec>, NotifyError> {
        Ok(self.channels.get(id).cloned())
    }
}

// ── Built-in drivers ────────────────────────────────────────────────

/// The built-in channel drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Ntfy,
    Pushover,
    Discord,
    Webhook,
    Telegram,
    Email,
}

impl DriverKind {
    pub const ALL: [DriverKind; 6] = [
        DriverKind::Ntfy,
        DriverKind::Pushover,
        DriverKind::Discord,
        DriverKind::Webhook,
        DriverKind::Telegram,
        DriverKind::Email,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DriverKind::Ntfy => "ntfy",
            DriverKind::Pushover => "pushover",
            DriverKind::Discord => "discord",
            DriverKind::Webhook => "webhook",
            DriverKind::Telegram => "telegram",
            DriverKind::Email => "email",
        }
    }

    fn build(self, spec: &ChannelSpec, ctx: &DriverContext) -> Result<Box<dyn Notifier>, NotifyError> {
        let notifier: Box<dyn Notifier> = match self {
            DriverKind::Ntfy => Box::new(NtfyNotifier::from_channel(spec, ctx)?),
            DriverKind::Pushover => Box::new(PushoverNotifier::from_channel(spec, ctx)?),
            DriverKind::Discord => Box::new(DiscordNotifier::from_channel(spec, ctx)?),
            DriverKind::Webhook => Box::new(WebhookNotifier::from_channel(spec, ctx)?),
            DriverKind::Telegram => Box::new(TelegramNotifier::from_channel(spec, ctx)?),
            DriverKind::Email => Box::new(EmailNotifier::from_channel(spec)?),
        };
        Ok(notifier)
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DriverKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| NotifyError::UnknownDriver(s.to_string()))
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Shared resources handed to every driver constructor.
#[derive(Debug, Clone)]
pub struct DriverContext {
    /// Pooled HTTP client shared by all HTTP drivers.
    pub client: reqwest::Client,
    pub renderer: Arc<TemplateRenderer>,
}

impl Default for DriverContext {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            renderer: Arc::new(TemplateRenderer::new()),
        }
    }
}

/// Constructor turning a channel spec into a live notifier.
pub type NotifierFactory =
    Arc<dyn Fn(&ChannelSpec, &DriverContext) -> Result<Box<dyn Notifier>, NotifyError> + Send + Sync>;

/// Maps driver names to notifier constructors.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    factories: BTreeMap<String, NotifierFactory>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every [`DriverKind`] registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in DriverKind::ALL {
            registry.register(kind.as_str(), move |spec, ctx| kind.build(spec, ctx));
        }
        registry
    }

    /// Register (or replace) the constructor for a driver name.
    pub fn register<F>(&mut self, driver: impl Into<String>, factory: F)
    where
        F: Fn(&ChannelSpec, &DriverContext) -> Result<Box<dyn Notifier>, NotifyError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(driver.into(), Arc::new(factory));
    }

    pub fn contains(&self, driver: &str) -> bool {
        self.factories.contains_key(driver)
    }

    /// Registered driver names, sorted.
    pub fn drivers(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Build a notifier for a channel.
    ///
    /// # Errors
    ///
    /// [`NotifyError::UnknownDriver`] when no constructor is registered for
    /// the channel's driver, or whatever the constructor reports.
    pub fn build(
        &self,
        spec: &ChannelSpec,
        ctx: &DriverContext,
    ) -> Result<Box<dyn Notifier>, NotifyError> {
        let factory = self
            .factories
            .get(&spec.driver)
            .ok_or_else(|| NotifyError::UnknownDriver(spec.driver.clone()))?;
        factory(spec, ctx)
    }
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}
