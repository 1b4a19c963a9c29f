//! Flat condition predicates over payload fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One predicate over a payload field. Every operator that is set must hold.
///
/// ```yaml
/// - field: odometer
///   gte: 50000
/// - field: status
///   in: [down, degraded]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Dotted path into the payload (`vehicle.name`).
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neq: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_in: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
}

impl Condition {
    pub fn on(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }

    pub fn equals(mut self, value: impl Into<Value>) -> Self {
        self.eq = Some(value.into());
        self
    }

    /// Names of the operators set on this condition.
    pub fn operators(&self) -> Vec<&'static str> {
        let mut ops = Vec::new();
        for (name, set) in [
            ("eq", self.eq.is_some()),
            ("neq", self.neq.is_some()),
            ("gt", self.gt.is_some()),
            ("gte", self.gte.is_some()),
            ("lt", self.lt.is_some()),
            ("lte", self.lte.is_some()),
            ("in", self.one_of.is_some()),
            ("not_in", self.not_in.is_some()),
            ("exists", self.exists.is_some()),
        ] {
            if set {
                ops.push(name);
            }
        }
        ops
    }

    /// Threshold operators with their operands.
    pub fn numeric_operands(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        [("gt", &self.gt), ("gte", &self.gte), ("lt", &self.lt), ("lte", &self.lte)]
            .into_iter()
            .filter_map(|(name, v)| v.as_ref().map(|v| (name, v)))
    }
}
