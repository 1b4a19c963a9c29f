//! Timing checks: cron expressions and cooldowns of scheduled rules.

use lifeops_core::duration::parse_duration;

use super::ValidationResult;
use crate::schema::*;
use crate::ticks::parse_cron;

pub(super) fn validate_schedule(rule: &NotificationRule, result: &mut ValidationResult) {
    let trigger = &rule.trigger;
    if trigger.timing == Timing::Immediate {
        if trigger.schedule.is_some() {
            result.warn("trigger.schedule", "Schedule is ignored for immediate rules");
        }
        if trigger.digest {
            result.warn("trigger.digest", "Digest only applies to scheduled rules");
        }
        return;
    }

    let Some(schedule) = &trigger.schedule else {
        return;
    };
    if let Some(expr) = &schedule.cron {
        validate_cron(expr, result);
    }
    if let Some(cooldown) = &schedule.cooldown {
        if parse_duration(cooldown).is_none() {
            result.error(
                "trigger.schedule.cooldown",
                format!("Invalid duration '{cooldown}', expected e.g. '30m', '12h', '1d'"),
            );
        }
    }
}

pub(crate) fn validate_cron(expr: &str, result: &mut ValidationResult) {
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        result.error(
            "trigger.schedule.cron",
            format!("Cron must have exactly 5 fields (min hour dom month dow), got {fields}"),
        );
        return;
    }
    if let Err(e) = parse_cron(expr) {
        result.error("trigger.schedule.cron", format!("Invalid cron '{expr}': {e}"));
    }
}
