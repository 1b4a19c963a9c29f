//! Channel checks: known driver, raw secrets.

use serde_json::Value;

use lifeops_core::expand::has_env_reference;

use super::fuzzy::fuzzy_match;
use super::{ValidationContext, ValidationResult};
use crate::schema::ChannelDocument;

/// Config keys whose values are credentials.
const SECRET_KEYS: &[&str] = &["token", "bot_token", "password", "user_key", "api_key", "webhook_url"];

pub(super) fn validate_channel(channel: &ChannelDocument, ctx: &ValidationContext, result: &mut ValidationResult) {
    if !ctx.channel_drivers.iter().any(|d| d == &channel.driver) {
        let known: Vec<&str> = ctx.channel_drivers.iter().map(String::as_str).collect();
        result.error_with_suggestion(
            "driver",
            format!("Unknown channel driver '{}' (known: {})", channel.driver, known.join(", ")),
            fuzzy_match(&channel.driver, &known),
        );
    }

    for (key, value) in &channel.config {
        if let Value::String(s) = value {
            if looks_like_raw_secret(key, s) {
                result.warn(
                    format!("config.{key}"),
                    "Value looks like a raw secret; consider '${ENV_VAR}' instead",
                );
            }
        }
    }
}

fn looks_like_raw_secret(key: &str, value: &str) -> bool {
    if value.is_empty() || has_env_reference(value) {
        return false;
    }
    if SECRET_KEYS.contains(&key) {
        return true;
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return false;
    }
    // Token-shaped: long, alphanumeric with separators.
    value.len() >= 20
        && !value.contains(' ')
        && value.chars().any(|c| c.is_ascii_alphabetic())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| ":_-".contains(c))
}
