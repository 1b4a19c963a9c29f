use thiserror::Error;

/// Errors raised while building or polling an integration.
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication rejected by {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected response from {service}: {detail}")]
    Protocol { service: String, detail: String },

    #[error("Poll timed out after {0}s")]
    Timeout(u64),

    #[error("Unknown integration type: {0}")]
    UnknownType(String),

    #[error("Schema unavailable for {0}")]
    Schema(String),
}

impl From<lifeops_core::CoreError> for IntegrationError {
    fn from(e: lifeops_core::CoreError) -> Self {
        match e {
            lifeops_core::CoreError::Config(msg) => IntegrationError::Config(msg),
            other => IntegrationError::Config(other.to_string()),
        }
    }
}

impl IntegrationError {
    /// Classify a non-2xx HTTP status.
    pub(crate) fn from_status(service: &str, status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => IntegrationError::Auth(format!("{service} ({status})")),
            _ => IntegrationError::Protocol {
                service: service.to_string(),
                detail: format!("{status}: {body}"),
            },
        }
    }
}
