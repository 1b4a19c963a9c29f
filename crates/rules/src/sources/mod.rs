//! Built-in sweep sources.

pub mod maintenance;

pub use maintenance::{MaintenanceDueSource, MaintenanceExport, ServiceInterval, Vehicle};
