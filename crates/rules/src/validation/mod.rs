//! Document validation with structured errors and suggestions.
//!
//! Errors block loading; warnings are advisory. The loader runs
//! [`validate_document`] on every file and rejects documents with errors.

mod channel_checks;
mod integration_checks;
mod rule_checks;
mod schedule_checks;

pub mod fuzzy;

use serde::{Deserialize, Serialize};

use lifeops_integrations::IntegrationRegistry;
use lifeops_notify::{ChannelRegistry, TemplateRenderer};

use crate::schema::*;

// ── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Location inside the document, e.g. `"conditions[1].gte"`.
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    pub(crate) fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }

    pub(crate) fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
            suggestion: suggestion.map(|s| format!("Did you mean '{s}'?")),
        });
    }

    pub(crate) fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Errors joined into one line, for load failures.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| match &e.suggestion {
                Some(s) => format!("{}: {} ({s})", e.path, e.message),
                None => format!("{}: {}", e.path, e.message),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn warning_lines(&self) -> Vec<String> {
        self.warnings
            .iter()
            .map(|w| format!("{}: {}", w.path, w.message))
            .collect()
    }
}

// ── Context ─────────────────────────────────────────────────────────

/// What a document may reference: known channel drivers and integration types.
pub struct ValidationContext {
    pub channel_drivers: Vec<String>,
    pub integration_types: Vec<String>,
    renderer: TemplateRenderer,
}

impl ValidationContext {
    pub fn new(channel_drivers: Vec<String>, integration_types: Vec<String>) -> Self {
        Self {
            channel_drivers,
            integration_types,
            renderer: TemplateRenderer::new(),
        }
    }

    /// Built from the registries the daemon actually runs with.
    pub fn from_registries(channels: &ChannelRegistry, integrations: &IntegrationRegistry) -> Self {
        Self::new(channels.drivers(), integrations.types())
    }

    /// Built-in channel drivers and integration types.
    pub fn builtin() -> Self {
        Self::from_registries(&ChannelRegistry::builtin(), &IntegrationRegistry::builtin())
    }

    pub(crate) fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationContext")
            .field("channel_drivers", &self.channel_drivers)
            .field("integration_types", &self.integration_types)
            .finish()
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Validate any [`RuleDocument`] variant.
pub fn validate_document(doc: &RuleDocument, ctx: &ValidationContext) -> ValidationResult {
    let mut result = ValidationResult::new();
    rule_checks::validate_metadata(doc, &mut result);
    match doc {
        RuleDocument::Rule(rule) => {
            rule_checks::validate_trigger(rule, &mut result);
            rule_checks::validate_conditions(rule, &mut result);
            rule_checks::validate_channels(rule, &mut result);
            rule_checks::validate_template(rule, ctx, &mut result);
            schedule_checks::validate_schedule(rule, &mut result);
        }
        RuleDocument::Channel(channel) => {
            channel_checks::validate_channel(channel, ctx, &mut result);
        }
        RuleDocument::Integration(integration) => {
            integration_checks::validate_integration(integration, ctx, &mut result);
        }
    }
    result
}

/// Parse raw YAML and validate. Parse errors are reported as errors at the root.
pub fn validate_yaml(yaml: &str, ctx: &ValidationContext) -> ValidationResult {
    let parsed = serde_yaml::from_str::<RuleEnvelope>(yaml)
        .map_err(|e| format!("YAML parse error: {e}"))
        .and_then(|envelope| envelope.parse_full());
    match parsed {
        Ok(doc) => validate_document(&doc, ctx),
        Err(e) => {
            let mut result = ValidationResult::new();
            result.error("", e);
            result
        }
    }
}
