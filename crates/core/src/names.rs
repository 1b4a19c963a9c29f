//! Event catalog.
//!
//! Every event a producer may emit is listed here together with the payload
//! fields it carries, so rule authors know which `{{field}}` placeholders and
//! condition fields are available. Validation uses the catalog to flag
//! unknown trigger names.

pub const MAINTENANCE_CREATED: &str = "maintenance.created";
pub const MAINTENANCE_DUE_SOON: &str = "maintenance.due_soon";
pub const MAINTENANCE_OVERDUE: &str = "maintenance.overdue";
pub const FUEL_LOGGED: &str = "fuel.logged";
pub const NOTE_CREATED: &str = "note.created";
pub const INTEGRATION_STATUS_CHANGED: &str = "integration.status_changed";
pub const INTEGRATION_CONTAINER_STOPPED: &str = "integration.container_stopped";
pub const INTEGRATION_CONTAINER_STARTED: &str = "integration.container_started";
pub const INTEGRATION_RESOURCE_ADDED: &str = "integration.resource_added";
pub const INTEGRATION_RESOURCE_REMOVED: &str = "integration.resource_removed";
pub const INTEGRATION_UNREACHABLE: &str = "integration.unreachable";
pub const INTEGRATION_RECOVERED: &str = "integration.recovered";

/// Documentation for one event name.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct EventSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [&'static str],
}

const RESOURCE_TRANSITION_FIELDS: &[&str] = &[
    "integration_id",
    "integration_name",
    "integration_type",
    "resource_id",
    "resource_kind",
    "resource_name",
    "previous_status",
    "status",
];

const RESOURCE_PRESENCE_FIELDS: &[&str] = &[
    "integration_id",
    "integration_name",
    "integration_type",
    "resource_id",
    "resource_kind",
    "resource_name",
    "status",
];

static CATALOG: &[EventSpec] = &[
    EventSpec {
        name: MAINTENANCE_CREATED,
        description: "A maintenance log entry was recorded for a vehicle",
        fields: &[
            "vehicle_id",
            "vehicle_name",
            "service_type",
            "odometer",
            "cost",
            "performed_on",
            "notes",
        ],
    },
    EventSpec {
        name: MAINTENANCE_DUE_SOON,
        description: "A maintenance interval falls due within the configured window",
        fields: &[
            "vehicle_id",
            "vehicle_name",
            "service_type",
            "due_on",
            "days_remaining",
            "miles_remaining",
        ],
    },
    EventSpec {
        name: MAINTENANCE_OVERDUE,
        description: "A maintenance interval has passed without a service",
        fields: &[
            "vehicle_id",
            "vehicle_name",
            "service_type",
            "due_on",
            "days_overdue",
            "miles_overdue",
        ],
    },
    EventSpec {
        name: FUEL_LOGGED,
        description: "A fuel-up was recorded",
        fields: &[
            "vehicle_id",
            "vehicle_name",
            "gallons",
            "price_per_gallon",
            "total_cost",
            "odometer",
            "mpg",
        ],
    },
    EventSpec {
        name: NOTE_CREATED,
        description: "A note was created",
        fields: &["note_id", "title", "tags"],
    },
    EventSpec {
        name: INTEGRATION_STATUS_CHANGED,
        description: "A monitored resource changed status",
        fields: RESOURCE_TRANSITION_FIELDS,
    },
    EventSpec {
        name: INTEGRATION_CONTAINER_STOPPED,
        description: "A running container left the running state",
        fields: RESOURCE_TRANSITION_FIELDS,
    },
    EventSpec {
        name: INTEGRATION_CONTAINER_STARTED,
        description: "A container entered the running state",
        fields: RESOURCE_TRANSITION_FIELDS,
    },
    EventSpec {
        name: INTEGRATION_RESOURCE_ADDED,
        description: "A new resource appeared in an integration",
        fields: RESOURCE_PRESENCE_FIELDS,
    },
    EventSpec {
        name: INTEGRATION_RESOURCE_REMOVED,
        description: "A resource disappeared from an integration",
        fields: RESOURCE_PRESENCE_FIELDS,
    },
    EventSpec {
        name: INTEGRATION_UNREACHABLE,
        description: "An integration failed to poll repeatedly",
        fields: &[
            "integration_id",
            "integration_name",
            "integration_type",
            "error",
            "consecutive_failures",
        ],
    },
    EventSpec {
        name: INTEGRATION_RECOVERED,
        description: "An unreachable integration polled successfully again",
        fields: &[
            "integration_id",
            "integration_name",
            "integration_type",
            "downtime_secs",
        ],
    },
];

/// All documented events.
pub fn catalog() -> &'static [EventSpec] {
    CATALOG
}

/// Look up the documentation for one event name.
pub fn spec_for(name: &str) -> Option<&'static EventSpec> {
    CATALOG.iter().find(|s| s.name == name)
}

/// Names of all documented events.
pub fn known_names() -> Vec<&'static str> {
    CATALOG.iter().map(|s| s.name).collect()
}
