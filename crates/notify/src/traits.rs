//! Notifier trait definition and shared error types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Delivery timed out after {0}s")]
    Timeout(u64),

    #[error("Unknown channel driver: {0}")]
    UnknownDriver(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Channel disabled: {0}")]
    ChannelDisabled(String),

    #[error("Channel store error: {0}")]
    Store(String),
}

impl From<lifeops_core::CoreError> for NotifyError {
    fn from(e: lifeops_core::CoreError) -> Self {
        match e {
            lifeops_core::CoreError::Config(msg) => NotifyError::Config(msg),
            other => NotifyError::Config(other.to_string()),
        }
    }
}

impl NotifyError {
    /// Classify a non-2xx HTTP status into the matching error variant.
    pub(crate) fn from_status(service: &str, status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => NotifyError::Auth(format!("{service} returned {status}")),
            429 => NotifyError::RateLimited { retry_after_secs: 30 },
            _ => NotifyError::Config(format!("{service} returned {status}: {body}")),
        }
    }
}

/// Urgency of a notification. Drivers map it onto their own scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Min,
    Low,
    #[default]
    Default,
    High,
    Urgent,
}

impl Priority {
    /// 1 (min) to 5 (urgent), the ntfy scale.
    pub fn level(self) -> u8 {
        match self {
            Priority::Min => 1,
            Priority::Low => 2,
            Priority::Default => 3,
            Priority::High => 4,
            Priority::Urgent => 5,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Min => "min",
            Priority::Low => "low",
            Priority::Default => "default",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "min" | "1" => Ok(Priority::Min),
            "low" | "2" => Ok(Priority::Low),
            "default" | "normal" | "3" => Ok(Priority::Default),
            "high" | "4" => Ok(Priority::High),
            "urgent" | "max" | "5" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: '{other}'")),
        }
    }
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// The rendered title.
    pub title: String,
    /// The rendered body content.
    pub body: String,
    pub priority: Priority,
    /// Additional metadata (rule id, event name).
    pub metadata: HashMap<String, String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Test connectivity with a sample notification.
    async fn test(&self) -> Result<(), NotifyError> {
        let test_notification = Notification::new(
            "[TEST] lifeops notification test",
            "This is a test notification from lifeops.",
            Priority::Default,
        )
        .with_metadata("rule_id", "test-rule")
        .with_metadata("event", "test");
        self.send(&test_notification).await
    }

    /// Human-readable name for this channel driver (e.g., "webhook", "ntfy").
    fn channel_name(&self) -> &str;
}

/// Outcome of dispatching one rendered message to one channel.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub channel_id: String,
    /// Driver that handled the attempt, when the channel resolved.
    pub driver: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl DeliveryAttempt {
    pub(crate) fn failed(channel_id: &str, driver: Option<String>, error: &NotifyError) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            driver,
            success: false,
            error: Some(error.to_string()),
            duration_ms: 0,
        }
    }
}
