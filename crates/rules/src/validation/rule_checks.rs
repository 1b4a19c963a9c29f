//! Metadata and notification rule checks.

use std::collections::HashSet;

use serde_json::Value;

use lifeops_core::names;

use super::fuzzy::{fuzzy_match, is_kebab_case};
use super::{ValidationContext, ValidationResult};
use crate::schema::*;

pub(super) fn validate_metadata(doc: &RuleDocument, result: &mut ValidationResult) {
    let meta = doc.metadata();
    if meta.id.trim().is_empty() {
        result.error("metadata.id", "Document id must not be empty");
    } else if !is_kebab_case(&meta.id) {
        result.warn(
            "metadata.id",
            format!("Id '{}' is not kebab-case (e.g. 'oil-change-logged')", meta.id),
        );
    }
    if meta.name.trim().is_empty() {
        result.warn("metadata.name", "Name is empty");
    }
}

pub(super) fn validate_trigger(rule: &NotificationRule, result: &mut ValidationResult) {
    let event = rule.trigger.event.trim();
    if event.is_empty() {
        result.error("trigger.event", "Trigger event must not be empty");
        return;
    }
    if names::spec_for(event).is_none() {
        let known = names::known_names();
        let message = match fuzzy_match(event, &known) {
            Some(s) => format!("Unknown event '{event}'. Did you mean '{s}'?"),
            None => format!("Unknown event '{event}'; no producer emits it"),
        };
        result.warn("trigger.event", message);
    }
}

pub(super) fn validate_conditions(rule: &NotificationRule, result: &mut ValidationResult) {
    for (i, cond) in rule.conditions.iter().enumerate() {
        let path = format!("conditions[{i}]");
        if cond.field.trim().is_empty() {
            result.error(format!("{path}.field"), "Condition field must not be empty");
        }
        if cond.operators().is_empty() {
            result.error(
                path.clone(),
                "Condition has no operator (eq, neq, gt, gte, lt, lte, in, not_in, exists)",
            );
        }
        for (op, operand) in cond.numeric_operands() {
            if !is_numeric(operand) {
                result.error(
                    format!("{path}.{op}"),
                    format!("'{op}' needs a number, got {operand}"),
                );
            }
        }
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

pub(super) fn validate_channels(rule: &NotificationRule, result: &mut ValidationResult) {
    if rule.channels.is_empty() {
        result.error("channels", "At least one channel must be referenced");
        return;
    }
    let mut seen = HashSet::new();
    for (i, id) in rule.channels.iter().enumerate() {
        if id.trim().is_empty() {
            result.error(format!("channels[{i}]"), "Channel id must not be empty");
        } else if !seen.insert(id.as_str()) {
            result.warn(format!("channels[{i}]"), format!("Channel '{id}' is listed twice"));
        }
    }
}

pub(super) fn validate_template(
    rule: &NotificationRule,
    ctx: &ValidationContext,
    result: &mut ValidationResult,
) {
    if rule.template.title.trim().is_empty() {
        result.error("template.title", "Template title must not be empty");
    }
    for (path, source) in [("template.title", &rule.template.title), ("template.body", &rule.template.body)] {
        if let Err(e) = ctx.renderer().validate(source) {
            result.error(path, e.to_string());
        }
    }
}
