//! Resource snapshots and the transitions between two of them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use lifeops_core::names;
use lifeops_core::Payload;

use crate::config::IntegrationConfig;

/// Status string drivers use for a running container.
pub const RUNNING: &str = "running";

/// Observed state of one resource (container, entity, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource kind, e.g. `container`, `light`, `sensor`.
    pub kind: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

impl ResourceState {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            status: status.into(),
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// All resources of one integration at one poll, keyed by resource id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    resources: BTreeMap<String, ResourceState>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, state: ResourceState) {
        self.resources.insert(id.into(), state);
    }

    pub fn with(mut self, id: impl Into<String>, state: ResourceState) -> Self {
        self.insert(id, state);
        self
    }

    pub fn get(&self, id: &str) -> Option<&ResourceState> {
        self.resources.get(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResourceState)> {
        self.resources.iter()
    }
}

impl FromIterator<(String, ResourceState)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, ResourceState)>>(iter: I) -> Self {
        Self {
            resources: iter.into_iter().collect(),
        }
    }
}

/// One observed change between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Added {
        id: String,
        state: ResourceState,
    },
    Removed {
        id: String,
        state: ResourceState,
    },
    StatusChanged {
        id: String,
        previous: String,
        state: ResourceState,
    },
}

/// Changes from `old` to `new`, ordered by resource id.
///
/// Only status changes count; attribute churn is ignored.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<Transition> {
    let mut transitions = Vec::new();

    for (id, state) in &new.resources {
        match old.resources.get(id) {
            None => transitions.push(Transition::Added {
                id: id.clone(),
                state: state.clone(),
            }),
            Some(prev) if prev.status != state.status => {
                transitions.push(Transition::StatusChanged {
                    id: id.clone(),
                    previous: prev.status.clone(),
                    state: state.clone(),
                })
            }
            Some(_) => {}
        }
    }

    for (id, state) in &old.resources {
        if !new.resources.contains_key(id) {
            transitions.push(Transition::Removed {
                id: id.clone(),
                state: state.clone(),
            });
        }
    }

    transitions.sort_by(|a, b| a.id().cmp(b.id()));
    transitions
}

impl Transition {
    pub fn id(&self) -> &str {
        match self {
            Transition::Added { id, .. }
            | Transition::Removed { id, .. }
            | Transition::StatusChanged { id, .. } => id,
        }
    }

    /// Bus events describing this transition.
    ///
    /// Container status changes yield the specific `container_started` /
    /// `container_stopped` event followed by the generic `status_changed`.
    pub fn events(&self, integration: &IntegrationConfig) -> Vec<(&'static str, Payload)> {
        match self {
            Transition::Added { id, state } => {
                vec![(names::INTEGRATION_RESOURCE_ADDED, presence_payload(integration, id, state))]
            }
            Transition::Removed { id, state } => {
                vec![(names::INTEGRATION_RESOURCE_REMOVED, presence_payload(integration, id, state))]
            }
            Transition::StatusChanged { id, previous, state } => {
                let mut payload = presence_payload(integration, id, state);
                payload.insert("previous_status".into(), json!(previous));

                let mut events = Vec::with_capacity(2);
                if state.kind == "container" {
                    if previous == RUNNING && state.status != RUNNING {
                        events.push((names::INTEGRATION_CONTAINER_STOPPED, payload.clone()));
                    } else if previous != RUNNING && state.status == RUNNING {
                        events.push((names::INTEGRATION_CONTAINER_STARTED, payload.clone()));
                    }
                }
                events.push((names::INTEGRATION_STATUS_CHANGED, payload));
                events
            }
        }
    }
}

/// Common fields for every resource event.
pub(crate) fn integration_payload(integration: &IntegrationConfig) -> Payload {
    let mut payload = Payload::new();
    payload.insert("integration_id".into(), json!(integration.id));
    payload.insert("integration_name".into(), json!(integration.name));
    payload.insert("integration_type".into(), json!(integration.integration_type));
    payload
}

fn presence_payload(integration: &IntegrationConfig, id: &str, state: &ResourceState) -> Payload {
    let mut payload = integration_payload(integration);
    payload.insert("resource_id".into(), json!(id));
    payload.insert("resource_kind".into(), json!(state.kind));
    payload.insert("resource_name".into(), json!(state.name));
    payload.insert("status".into(), json!(state.status));
    payload
}
