use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Ordered field map carried by every event. Keys are the template
/// variables available to rules listening on that event.
pub type Payload = IndexMap<String, Value>;

/// An ephemeral fact about something that happened.
///
/// Events are never persisted: they exist for the duration of one dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Uuid,
    /// Dot-namespaced name, e.g. `maintenance.created`.
    pub name: String,
    pub emitted_at: DateTime<Utc>,
    pub payload: Payload,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            emitted_at: Utc::now(),
            payload,
        }
    }

    /// Look up a payload field. Dotted paths (`vehicle.name`) descend into
    /// nested objects; a literal key containing dots wins over descent.
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup(&self.payload, path)
    }

    /// The event namespace (`maintenance` for `maintenance.created`).
    pub fn namespace(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }
}

/// Resolve a dotted path against a payload.
pub fn lookup<'a>(payload: &'a Payload, path: &str) -> Option<&'a Value> {
    if let Some(v) = payload.get(path) {
        return Some(v);
    }

    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = payload.get(first)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Build a [`Payload`] from a JSON value. Non-object values produce an
/// empty payload.
pub fn payload_from_json(value: Value) -> Payload {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Payload::new(),
    }
}

/// Receiver side of the event contract.
///
/// `emit` never fails and never panics back into the caller: the outcome of
/// the producing operation must not depend on notification delivery.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, name: &str, payload: Payload);
}

/// Sink that drops every event. Used when notifications are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait::async_trait]
impl EventSink for NullSink {
    async fn emit(&self, name: &str, _payload: Payload) {
        tracing::trace!(event = %name, "event dropped by null sink");
    }
}
