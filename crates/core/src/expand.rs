//! `${VAR_NAME}` expansion for secrets referenced from YAML documents.

use crate::error::CoreError;

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
pub fn resolve_env_vars(input: &str) -> Result<String, CoreError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(CoreError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| CoreError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Whether the string references at least one `${VAR}`.
pub fn has_env_reference(input: &str) -> bool {
    input
        .find("${")
        .is_some_and(|start| input[start..].contains('}'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("LIFEOPS_ENV_TEST_HOST", "ntfy.example.com");
        let result = resolve_env_vars("https://${LIFEOPS_ENV_TEST_HOST}/alerts").unwrap();
        assert_eq!(result, "https://ntfy.example.com/alerts");
        std::env::remove_var("LIFEOPS_ENV_TEST_HOST");
    }

    #[test]
    fn resolve_env_vars_multiple() {
        std::env::set_var("LIFEOPS_ENV_PROTO", "https");
        std::env::set_var("LIFEOPS_ENV_HOST", "api.test");
        let result = resolve_env_vars("${LIFEOPS_ENV_PROTO}://${LIFEOPS_ENV_HOST}/v1").unwrap();
        assert_eq!(result, "https://api.test/v1");
        std::env::remove_var("LIFEOPS_ENV_PROTO");
        std::env::remove_var("LIFEOPS_ENV_HOST");
    }

    #[test]
    fn resolve_env_vars_missing() {
        match resolve_env_vars("https://${ABSOLUTELY_NOT_SET_12345}/hook").unwrap_err() {
            CoreError::Config(msg) => assert!(msg.contains("ABSOLUTELY_NOT_SET_12345")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn resolve_env_vars_unclosed() {
        match resolve_env_vars("https://${UNCLOSED/hook").unwrap_err() {
            CoreError::Config(msg) => assert!(msg.contains("unclosed")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn plain_dollar_is_literal() {
        assert_eq!(resolve_env_vars("costs $5").unwrap(), "costs $5");
    }

    #[test]
    fn detects_references() {
        assert!(has_env_reference("${TOKEN}"));
        assert!(has_env_reference("Bearer ${TOKEN}"));
        assert!(!has_env_reference("plain"));
        assert!(!has_env_reference("${broken"));
    }
}
