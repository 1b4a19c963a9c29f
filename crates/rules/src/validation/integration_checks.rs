//! Integration checks: registered type, poll interval.

use super::fuzzy::fuzzy_match;
use super::{ValidationContext, ValidationResult};
use crate::schema::IntegrationDocument;

pub(super) fn validate_integration(
    integration: &IntegrationDocument,
    ctx: &ValidationContext,
    result: &mut ValidationResult,
) {
    let ty = &integration.integration_type;
    if !ctx.integration_types.iter().any(|t| t == ty) {
        let known: Vec<&str> = ctx.integration_types.iter().map(String::as_str).collect();
        result.error_with_suggestion(
            "type",
            format!("Unknown integration type '{ty}' (known: {})", known.join(", ")),
            fuzzy_match(ty, &known),
        );
    }

    if let Err(e) = integration.to_config() {
        result.error("poll_interval", e);
    }

    if integration.connection.is_empty() {
        result.warn("connection", "No connection settings");
    }
}
