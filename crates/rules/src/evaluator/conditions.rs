//! Condition matching with loose equality.
//!
//! Numbers compare numerically, and a numeric string equals the number it
//! spells (`"50000" == 50000`). Everything else uses JSON equality, so
//! string comparison is exact. A missing or null field fails every operator
//! except `neq`, `not_in` and `exists: false`.

use serde_json::Value;

use lifeops_core::{lookup, Payload};

use crate::schema::Condition;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("condition has an empty field path")]
    EmptyField,

    #[error("condition on '{0}' has no operator")]
    NoOperator(String),

    #[error("condition on '{field}': '{op}' needs a number, got {value}")]
    NotNumeric {
        field: String,
        op: &'static str,
        value: String,
    },
}

/// Reject conditions that can never be evaluated meaningfully.
pub fn check_condition(cond: &Condition) -> Result<(), ConditionError> {
    if cond.field.trim().is_empty() {
        return Err(ConditionError::EmptyField);
    }
    if cond.operators().is_empty() {
        return Err(ConditionError::NoOperator(cond.field.clone()));
    }
    for (op, operand) in cond.numeric_operands() {
        if as_f64(operand).is_none() {
            return Err(ConditionError::NotNumeric {
                field: cond.field.clone(),
                op,
                value: operand.to_string(),
            });
        }
    }
    Ok(())
}

/// AND of all conditions. Every condition is checked before any is
/// evaluated, so an invalid condition fails the whole set.
pub fn matches_all(conditions: &[Condition], payload: &Payload) -> Result<bool, ConditionError> {
    for cond in conditions {
        check_condition(cond)?;
    }
    Ok(conditions.iter().all(|c| matches(c, payload)))
}

/// Evaluate one (already checked) condition.
pub fn matches(cond: &Condition, payload: &Payload) -> bool {
    let actual = lookup(payload, &cond.field).filter(|v| !v.is_null());

    if let Some(expected) = &cond.eq {
        if !actual.is_some_and(|a| loose_eq(a, expected)) {
            return false;
        }
    }
    if let Some(expected) = &cond.neq {
        if actual.is_some_and(|a| loose_eq(a, expected)) {
            return false;
        }
    }
    for (op, operand) in cond.numeric_operands() {
        let (Some(a), Some(b)) = (actual.and_then(as_f64), as_f64(operand)) else {
            return false;
        };
        let holds = match op {
            "gt" => a > b,
            "gte" => a >= b,
            "lt" => a < b,
            _ => a <= b,
        };
        if !holds {
            return false;
        }
    }
    if let Some(set) = &cond.one_of {
        if !actual.is_some_and(|a| set.iter().any(|v| loose_eq(a, v))) {
            return false;
        }
    }
    if let Some(set) = &cond.not_in {
        if actual.is_some_and(|a| set.iter().any(|v| loose_eq(a, v))) {
            return false;
        }
    }
    if let Some(should_exist) = cond.exists {
        if actual.is_some() != should_exist {
            return false;
        }
    }
    true
}

pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a.is_number() || b.is_number() {
        if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
            return x == y;
        }
    }
    a == b
}

/// A number, or a string that parses as one.
fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeops_core::payload_from_json;
    use serde_json::json;

    fn payload() -> Payload {
        payload_from_json(json!({
            "status": "down",
            "odometer": 51234,
            "miles_remaining": "120",
            "vehicle": {"name": "2020 Tacoma", "year": 2020},
            "notes": null,
        }))
    }

    fn cond(yaml: &str) -> Condition {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn eq_matches_exact_string() {
        assert!(matches(&cond("{field: status, eq: down}"), &payload()));
        assert!(!matches(&cond("{field: status, eq: up}"), &payload()));
        assert!(!matches(&cond("{field: status, eq: Down}"), &payload()));
    }

    #[test]
    fn numbers_compare_loosely() {
        assert!(matches(&cond("{field: odometer, eq: '51234'}"), &payload()));
        assert!(matches(&cond("{field: miles_remaining, eq: 120}"), &payload()));
        assert!(matches(&cond("{field: miles_remaining, lte: 500}"), &payload()));
        assert!(matches(&cond("{field: odometer, gte: 50000, lt: 60000}"), &payload()));
        assert!(!matches(&cond("{field: odometer, gt: 51234}"), &payload()));
        assert!(!matches(&cond("{field: status, gt: 1}"), &payload()));
    }

    #[test]
    fn dotted_paths() {
        assert!(matches(&cond("{field: vehicle.name, eq: 2020 Tacoma}"), &payload()));
        assert!(matches(&cond("{field: vehicle.year, in: [2019, 2020]}"), &payload()));
    }

    #[test]
    fn set_membership() {
        assert!(matches(&cond("{field: status, in: [down, degraded]}"), &payload()));
        assert!(!matches(&cond("{field: status, not_in: [down, degraded]}"), &payload()));
        assert!(matches(&cond("{field: status, not_in: [up]}"), &payload()));
    }

    #[test]
    fn missing_and_null_fields() {
        for field in ["missing", "notes"] {
            let p = payload();
            assert!(!matches(&cond(&format!("{{field: {field}, eq: x}}")), &p));
            assert!(!matches(&cond(&format!("{{field: {field}, gte: 0}}")), &p));
            assert!(!matches(&cond(&format!("{{field: {field}, in: [x]}}")), &p));
            assert!(!matches(&cond(&format!("{{field: {field}, exists: true}}")), &p));
            assert!(matches(&cond(&format!("{{field: {field}, neq: x}}")), &p));
            assert!(matches(&cond(&format!("{{field: {field}, not_in: [x]}}")), &p));
            assert!(matches(&cond(&format!("{{field: {field}, exists: false}}")), &p));
        }
        assert!(matches(&cond("{field: status, exists: true}"), &payload()));
    }

    #[test]
    fn empty_conditions_match() {
        assert_eq!(matches_all(&[], &payload()), Ok(true));
    }

    #[test]
    fn all_conditions_must_hold() {
        let conds = vec![cond("{field: status, eq: down}"), cond("{field: odometer, lt: 1000}")];
        assert_eq!(matches_all(&conds, &payload()), Ok(false));
    }

    #[test]
    fn invalid_conditions_are_errors() {
        let no_op = vec![cond("{field: status, eq: down}"), Condition::on("odometer")];
        assert_eq!(
            matches_all(&no_op, &payload()),
            Err(ConditionError::NoOperator("odometer".into()))
        );

        let not_numeric = vec![cond("{field: odometer, gte: lots}")];
        assert!(matches!(
            matches_all(&not_numeric, &payload()),
            Err(ConditionError::NotNumeric { op: "gte", .. })
        ));
    }
}
