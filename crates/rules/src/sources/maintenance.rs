//! Maintenance intervals that are coming due or overdue.
//!
//! Reads a YAML export of vehicles and their service intervals on every
//! sweep and synthesizes `maintenance.due_soon` / `maintenance.overdue`
//! events. A service can be interval-bound by days, by miles, or both;
//! whichever comes first decides.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use lifeops_core::{names, payload_from_json, Event};

use crate::sweep::{SweepError, SweepSource};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceExport {
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub id: Value,
    pub name: String,
    /// Current odometer reading, when known.
    #[serde(default)]
    pub odometer: Option<f64>,
    #[serde(default)]
    pub services: Vec<ServiceInterval>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceInterval {
    pub service_type: String,
    pub last_performed_on: NaiveDate,
    #[serde(default)]
    pub last_odometer: Option<f64>,
    #[serde(default)]
    pub interval_days: Option<i64>,
    #[serde(default)]
    pub interval_miles: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DueState {
    Ok,
    DueSoon,
    Overdue,
}

/// Days and miles left until a service, negative once past due.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Remaining {
    due_on: Option<NaiveDate>,
    days: Option<i64>,
    miles: Option<f64>,
}

impl ServiceInterval {
    /// `None` when the due date falls outside the calendar range.
    fn remaining(&self, today: NaiveDate, odometer: Option<f64>) -> Option<Remaining> {
        let due_on = match self.interval_days {
            Some(d) => Some(
                Duration::try_days(d).and_then(|delta| self.last_performed_on.checked_add_signed(delta))?,
            ),
            None => None,
        };
        let miles = match (self.interval_miles, self.last_odometer, odometer) {
            (Some(interval), Some(last), Some(current)) => Some(last + interval - current),
            _ => None,
        };
        Some(Remaining {
            due_on,
            days: due_on.map(|d| (d - today).num_days()),
            miles,
        })
    }
}

impl Remaining {
    fn state(&self, due_soon_days: i64, due_soon_miles: f64) -> DueState {
        let days_over = self.days.is_some_and(|d| d < 0);
        let miles_over = self.miles.is_some_and(|m| m < 0.0);
        if days_over || miles_over {
            return DueState::Overdue;
        }
        let days_soon = self.days.is_some_and(|d| d <= due_soon_days);
        let miles_soon = self.miles.is_some_and(|m| m <= due_soon_miles);
        if days_soon || miles_soon {
            DueState::DueSoon
        } else {
            DueState::Ok
        }
    }
}

/// Sweep source over a maintenance interval export.
#[derive(Debug, Clone)]
pub struct MaintenanceDueSource {
    path: PathBuf,
    due_soon_days: i64,
    due_soon_miles: f64,
}

impl MaintenanceDueSource {
    pub fn new(path: impl Into<PathBuf>, due_soon_days: i64, due_soon_miles: f64) -> Self {
        Self {
            path: path.into(),
            due_soon_days,
            due_soon_miles,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events for every interval that is due soon or overdue on `today`.
    pub fn events_for(&self, export: &MaintenanceExport, today: NaiveDate) -> Vec<Event> {
        let mut events = Vec::new();
        for vehicle in &export.vehicles {
            for service in &vehicle.services {
                let Some(remaining) = service.remaining(today, vehicle.odometer) else {
                    warn!(
                        vehicle = %vehicle.name,
                        service_type = %service.service_type,
                        interval_days = ?service.interval_days,
                        "service interval out of range, skipped"
                    );
                    continue;
                };
                let due_on = remaining.due_on.map(|d| d.to_string());
                let event = match remaining.state(self.due_soon_days, self.due_soon_miles) {
                    DueState::Ok => continue,
                    DueState::DueSoon => Event::new(
                        names::MAINTENANCE_DUE_SOON,
                        payload_from_json(json!({
                            "vehicle_id": vehicle.id,
                            "vehicle_name": vehicle.name,
                            "service_type": service.service_type,
                            "due_on": due_on,
                            "days_remaining": remaining.days,
                            "miles_remaining": remaining.miles,
                        })),
                    ),
                    DueState::Overdue => Event::new(
                        names::MAINTENANCE_OVERDUE,
                        payload_from_json(json!({
                            "vehicle_id": vehicle.id,
                            "vehicle_name": vehicle.name,
                            "service_type": service.service_type,
                            "due_on": due_on,
                            "days_overdue": remaining.days.filter(|d| *d < 0).map(|d| -d),
                            "miles_overdue": remaining.miles.filter(|m| *m < 0.0).map(|m| -m),
                        })),
                    ),
                };
                events.push(event);
            }
        }
        events
    }
}

#[async_trait::async_trait]
impl SweepSource for MaintenanceDueSource {
    fn name(&self) -> &str {
        "maintenance"
    }

    async fn collect(&self, now: DateTime<Utc>) -> Result<Vec<Event>, SweepError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no maintenance export, nothing due");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let export: MaintenanceExport = serde_yaml::from_str(&contents)?;
        Ok(self.events_for(&export, now.date_naive()))
    }
}
