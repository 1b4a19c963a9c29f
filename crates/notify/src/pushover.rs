//! Pushover push notifier.

use serde_json::json;

use crate::channel::{ChannelSpec, DriverContext};
use crate::traits::{Notification, Notifier, NotifyError, Priority};

const API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Emergency-priority messages repeat until acknowledged; Pushover requires
/// a retry interval and an expiry for them.
const EMERGENCY_RETRY_SECS: u32 = 60;
const EMERGENCY_EXPIRE_SECS: u32 = 3600;

/// Map a notification priority onto Pushover's −2..=2 scale.
pub fn pushover_priority(priority: Priority) -> i8 {
    match priority {
        Priority::Min => -2,
        Priority::Low => -1,
        Priority::Default => 0,
        Priority::High => 1,
        Priority::Urgent => 2,
    }
}

/// Sends notifications through the Pushover messages API.
#[derive(Debug)]
pub struct PushoverNotifier {
    token: String,
    user: String,
    device: Option<String>,
    sound: Option<String>,
    client: reqwest::Client,
}

impl PushoverNotifier {
    /// Config keys: `token` (application token), `user` (user or group key),
    /// optional `device` and `sound`.
    pub fn from_channel(spec: &ChannelSpec, ctx: &DriverContext) -> Result<Self, NotifyError> {
        Ok(Self {
            token: spec.required("token")?,
            user: spec.required("user")?,
            device: spec.optional("device")?,
            sound: spec.optional("sound")?,
            client: ctx.client.clone(),
        })
    }

    fn request(&self, notification: &Notification) -> Result<reqwest::Request, NotifyError> {
        let priority = pushover_priority(notification.priority);
        let mut body = json!({
            "token": self.token,
            "user": self.user,
            "title": notification.title,
            "message": notification.body,
            "priority": priority,
        });
        if priority == 2 {
            body["retry"] = json!(EMERGENCY_RETRY_SECS);
            body["expire"] = json!(EMERGENCY_EXPIRE_SECS);
        }
        if let Some(ref device) = self.device {
            body["device"] = json!(device);
        }
        if let Some(ref sound) = self.sound {
            body["sound"] = json!(sound);
        }

        Ok(self.client.post(API_URL).json(&body).build()?)
    }
}

#[async_trait::async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.execute(self.request(notification)?).await?;
        let status = response.status();

        if status.is_success() {
            tracing::debug!(user = %self.user, "pushover notification delivered");
            return Ok(());
        }

        let resp_body: serde_json::Value = response.json().await.unwrap_or_default();
        let errors = resp_body
            .get("errors")
            .and_then(|e| e.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default();

        tracing::warn!(%status, errors = %errors, "pushover rejected message");

        // Pushover reports bad tokens/user keys as 400 with an error list.
        if status == reqwest::StatusCode::BAD_REQUEST
            && (errors.contains("token") || errors.contains("user"))
        {
            return Err(NotifyError::Auth(format!("pushover: {errors}")));
        }
        Err(NotifyError::from_status("pushover", status, &errors))
    }

    fn channel_name(&self) -> &str {
        "pushover"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ChannelSpec {
        ChannelSpec::new("pushover", "pushover")
            .with_config("token", "app-token")
            .with_config("user", "user-key")
    }

    fn body_json(request: &reqwest::Request) -> serde_json::Value {
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn priority_mapping_covers_scale() {
        assert_eq!(pushover_priority(Priority::Min), -2);
        assert_eq!(pushover_priority(Priority::Default), 0);
        assert_eq!(pushover_priority(Priority::Urgent), 2);
    }

    #[test]
    fn builds_message_request() {
        let notifier = PushoverNotifier::from_channel(
            &spec().with_config("sound", "cashregister"),
            &DriverContext::default(),
        )
        .unwrap();
        let request = notifier
            .request(&Notification::new("Fuel logged", "12.1 gal", Priority::Low))
            .unwrap();

        assert_eq!(request.url().as_str(), API_URL);
        let body = body_json(&request);
        assert_eq!(body["token"], "app-token");
        assert_eq!(body["user"], "user-key");
        assert_eq!(body["priority"], -1);
        assert_eq!(body["sound"], "cashregister");
        assert!(body.get("retry").is_none());
    }

    #[test]
    fn emergency_priority_sets_retry_and_expire() {
        let notifier = PushoverNotifier::from_channel(&spec(), &DriverContext::default()).unwrap();
        let request = notifier
            .request(&Notification::new("Server down", "nas", Priority::Urgent))
            .unwrap();
        let body = body_json(&request);
        assert_eq!(body["priority"], 2);
        assert_eq!(body["retry"], 60);
        assert_eq!(body["expire"], 3600);
    }

    #[test]
    fn user_key_required() {
        let spec = ChannelSpec::new("p", "pushover").with_config("token", "t");
        let err = PushoverNotifier::from_channel(&spec, &DriverContext::default()).unwrap_err();
        assert!(err.to_string().contains("config.user"), "got: {err}");
    }
}
