//! Minijinja template rendering for notification messages.
//!
//! Rule templates reference event payload fields with `{{field}}`
//! placeholders. Rendering never fails from the caller's point of view:
//! undefined fields (including chained lookups such as `{{vehicle.color}}`)
//! render as empty strings, `null` renders as empty, and a template that
//! does not parse falls back to a placeholder scanner that substitutes every
//! balanced `{{ key }}` and keeps the rest literally.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call.

use minijinja::{UndefinedBehavior, Value};
use serde::Serialize;

use crate::traits::NotifyError;

/// Renders notification templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a configured minijinja environment with custom filters and globals.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);

        // `none` and undefined print as nothing instead of "none".
        env.set_formatter(|out, state, value| {
            if value.is_none() || value.is_undefined() {
                Ok(())
            } else {
                minijinja::escape_formatter(out, state, value)
            }
        });

        env.add_filter("round", round_filter);
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);

        env.add_function("env", env_function);

        env
    }

    /// Render a template, falling back to plain placeholder substitution when
    /// the template is malformed. Never fails.
    pub fn render<S: Serialize>(&self, template_str: &str, scope: &S) -> String {
        match self.try_render(template_str, scope) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "template did not render, using placeholder substitution"
                );
                let scope = serde_json::to_value(scope).unwrap_or(serde_json::Value::Null);
                substitute_placeholders(template_str, &scope)
            }
        }
    }

    /// Render a template strictly.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails (e.g., a filter applied to the wrong type).
    pub fn try_render<S: Serialize>(
        &self,
        template_str: &str,
        scope: &S,
    ) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, Value::from_serialize(scope))
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    ///
    /// Checks syntax only; the template is not evaluated.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort `{{ key }}` substitution used when minijinja rejects a template.
///
/// Filters after `|` are ignored. An opening `{{` without a closing `}}` is
/// copied through unchanged along with the rest of the input.
pub fn substitute_placeholders(template: &str, scope: &serde_json::Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let expr = &after_open[..end];
        // A nested "{{" means the earlier opener was stray text.
        if let Some(nested) = expr.rfind("{{") {
            out.push_str(&rest[start..start + 2 + nested]);
            rest = &after_open[nested..];
            continue;
        }

        let key = expr.split('|').next().unwrap_or("").trim();
        if let Some(value) = lookup_path(scope, key) {
            out.push_str(&value_to_text(value));
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

fn lookup_path<'a>(scope: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    if path.is_empty() {
        return None;
    }
    if let Some(v) = scope.get(path) {
        return Some(v);
    }
    path.split('.').try_fold(scope, |current, part| match current {
        serde_json::Value::Object(map) => map.get(part),
        serde_json::Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

/// Custom filter: lowercase a string.
fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

/// Custom filter: uppercase a string.
fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Global function: read an environment variable by name.
///
/// Returns the variable value, or an empty string if not found
/// (with a warning logged via tracing).
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}
